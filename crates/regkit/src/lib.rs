#![warn(missing_docs)]

//! A library and CLI to create, search, watch and query flags of registry keys.
//!
//! ## CLI
//! The `regkit` CLI works against the live registry on Windows, or against a
//! YAML snapshot of one on any platform (`--snapshot`).
//! ```shell
//! regkit -h
//! ```
//! #### Search
//! Lists every key below `HIVE\PATH` whose path ends with the term, or has the
//! term right before a separator:
//! ```shell
//! regkit SEARCH_KEY HKEY_LOCAL_MACHINE SOFTWARE TEST
//! ```
//! Output:
//! ```shell
//! Search result in HKEY_LOCAL_MACHINE\SOFTWARE\:
//! 0. TEST
//! 1. Vendor\TEST
//! Ok!
//! ```
//! #### View flags
//! Runs `reg FLAGS HIVE\PATH QUERY` and prints the parsed key flags:
//! ```shell
//! regkit VIEW_FLAGS HKLM SOFTWARE\TEST
//! ```
//! #### Write and watch
//! ```shell
//! regkit ADD_KEY HKEY_LOCAL_MACHINE SOFTWARE\TEST
//! regkit ADD_VALUE HKEY_LOCAL_MACHINE SOFTWARE\TEST Name REG_SZ hello
//! regkit NOTIFY HKEY_LOCAL_MACHINE SOFTWARE
//! ```
//! ## Library
//! The search and flag extraction engine is usable on its own: see
//! [`search::find_nodes`], [`enumerate::Enumerator`], [`channel::ProcessChannel`]
//! and [`flags::extract_flags`]. Store access goes through the
//! [`store::Registry`] and [`store::RegistryKey`] traits.

/// Print a message with `regkit: ` prepended and ANSI colors.
#[macro_export]
macro_rules! msg {
    ($($arg:tt)*) => ({
        use ansi_term::Color::*;
        print!("{} ", Blue.bold().paint("regkit:"));
        println!($($arg)*);
    })
}

pub mod accumulate;
pub mod channel;
pub mod cli;
pub mod config;
pub mod enumerate;
pub mod error;
pub mod flags;
pub mod matcher;
pub mod path;
pub mod search;
pub mod store;

pub use accumulate::PathList;
pub use error::{RegistryError, RegistryResult};
pub use path::KeyPath;
