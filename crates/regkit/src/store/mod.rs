//! Access to the hierarchical key store.
//!
//! [`Registry`] hands out the predefined hive keys, [`RegistryKey`] is an open
//! key. Dropping a key closes it, so a key opened for one step is released on
//! every way out of that step.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{RegistryError, RegistryResult};
use crate::path::KeyPath;

pub mod mem;
#[cfg(windows)]
pub mod native;

pub use mem::MemoryRegistry;
#[cfg(windows)]
pub use native::NativeRegistry;

/// Result of a store primitive.
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a store primitive.
#[allow(missing_docs)]
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Access denied to key: {0}")]
    AccessDenied(String),

    #[error("{call} failed: {source}")]
    Os {
        call: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is not supported by this store")]
    Unsupported(&'static str),

    #[error("Snapshot serialization error: {0}")]
    Snapshot(#[from] serde_yaml::Error),

    #[error("Error while reading or writing the snapshot: {0}")]
    Io(#[from] std::io::Error),
}

/// The predefined root keys.
#[allow(missing_docs)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize,
)]
pub enum Hive {
    #[display(fmt = "HKEY_CLASSES_ROOT")]
    #[serde(rename = "HKEY_CLASSES_ROOT")]
    ClassesRoot,
    #[display(fmt = "HKEY_CURRENT_USER")]
    #[serde(rename = "HKEY_CURRENT_USER")]
    CurrentUser,
    #[display(fmt = "HKEY_LOCAL_MACHINE")]
    #[serde(rename = "HKEY_LOCAL_MACHINE")]
    LocalMachine,
    #[display(fmt = "HKEY_USERS")]
    #[serde(rename = "HKEY_USERS")]
    Users,
    #[display(fmt = "HKEY_CURRENT_CONFIG")]
    #[serde(rename = "HKEY_CURRENT_CONFIG")]
    CurrentConfig,
}

impl Hive {
    /// Every hive, in the order they are listed by `regedit`.
    pub const ALL: [Hive; 5] = [
        Hive::ClassesRoot,
        Hive::CurrentUser,
        Hive::LocalMachine,
        Hive::Users,
        Hive::CurrentConfig,
    ];

    /// The abbreviation accepted by `reg.exe`, e.g. `HKLM`.
    pub fn short_name(self) -> &'static str {
        match self {
            Hive::ClassesRoot => "HKCR",
            Hive::CurrentUser => "HKCU",
            Hive::LocalMachine => "HKLM",
            Hive::Users => "HKU",
            Hive::CurrentConfig => "HKCC",
        }
    }

    /// Full name of `path` below this hive, e.g. `HKEY_LOCAL_MACHINE\SOFTWARE`.
    /// The root path is the hive name alone.
    pub fn key_name(self, path: &KeyPath) -> String {
        if path.is_root() {
            self.to_string()
        } else {
            format!("{self}\\{path}")
        }
    }
}

impl FromStr for Hive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hive::ALL
            .into_iter()
            .find(|h| h.to_string() == s || h.short_name() == s)
            .ok_or_else(|| format!("Unknown hive: {s}"))
    }
}

/// What an opened key will be used for.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Enumerate,
    Read,
    Write,
    Notify,
}

/// Outcome of creating a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The key did not exist before.
    CreatedNew,
    /// The key was already there and was only opened.
    OpenedExisting,
}

/// The four value kinds regkit can write.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ValueKind {
    #[display(fmt = "REG_SZ")]
    Sz,
    #[display(fmt = "REG_BINARY")]
    Binary,
    #[display(fmt = "REG_DWORD")]
    Dword,
    #[display(fmt = "REG_LINK")]
    Link,
}

impl FromStr for ValueKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REG_SZ" => Ok(ValueKind::Sz),
            "REG_BINARY" => Ok(ValueKind::Binary),
            "REG_DWORD" => Ok(ValueKind::Dword),
            "REG_LINK" => Ok(ValueKind::Link),
            _ => Err(format!("Unsupported value type: {s}")),
        }
    }
}

/// Data of a single named value.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum RegValue {
    #[serde(rename = "REG_SZ")]
    Sz(String),
    #[serde(rename = "REG_BINARY")]
    Binary(Vec<u8>),
    #[serde(rename = "REG_DWORD")]
    Dword(u32),
    #[serde(rename = "REG_LINK")]
    Link(String),
}

impl RegValue {
    /// Build a value of `kind` from its command line text.
    ///
    /// `REG_BINARY` takes the bytes of `data` as they are and `REG_DWORD`
    /// wants a decimal number.
    pub fn parse(kind: ValueKind, data: &str) -> RegistryResult<Self> {
        Ok(match kind {
            ValueKind::Sz => RegValue::Sz(data.to_string()),
            ValueKind::Binary => RegValue::Binary(data.as_bytes().to_vec()),
            ValueKind::Dword => RegValue::Dword(data.parse().map_err(|e| {
                RegistryError::InvalidArgument(format!("'{data}' is not a REG_DWORD: {e}"))
            })?),
            ValueKind::Link => RegValue::Link(data.to_string()),
        })
    }

    /// The kind this value is stored as.
    pub fn kind(&self) -> ValueKind {
        match self {
            RegValue::Sz(_) => ValueKind::Sz,
            RegValue::Binary(_) => ValueKind::Binary,
            RegValue::Dword(_) => ValueKind::Dword,
            RegValue::Link(_) => ValueKind::Link,
        }
    }

    /// The bytes handed to the store.
    /// Strings are UTF-16LE, `REG_SZ` with a terminating null.
    pub fn to_bytes(&self) -> Vec<u8> {
        fn utf16(s: &str, terminate: bool) -> Vec<u8> {
            s.encode_utf16()
                .chain(terminate.then_some(0))
                .flat_map(u16::to_le_bytes)
                .collect()
        }
        match self {
            RegValue::Sz(s) => utf16(s, true),
            RegValue::Binary(b) => b.clone(),
            RegValue::Dword(d) => d.to_le_bytes().to_vec(),
            RegValue::Link(s) => utf16(s, false),
        }
    }
}

impl fmt::Display for RegValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegValue::Sz(s) | RegValue::Link(s) => write!(f, "{} {s}", self.kind()),
            RegValue::Binary(b) => write!(f, "{} {b:02x?}", self.kind()),
            RegValue::Dword(d) => write!(f, "{} {d}", self.kind()),
        }
    }
}

/// An open key.
pub trait RegistryKey: Sized {
    /// Open `path` below this key.
    fn open(&self, path: &KeyPath, access: Access) -> StoreResult<Self>;

    /// Name of the direct child at `index`, `None` past the last child.
    fn enum_child(&self, index: u32) -> StoreResult<Option<String>>;

    /// Create `path` below this key, with any missing parents.
    fn create(&self, path: &KeyPath) -> StoreResult<Disposition>;

    /// Set the value `name` of the key at `path` below this key,
    /// creating that key if needed.
    fn set_value(&self, path: &KeyPath, name: &str, value: &RegValue) -> StoreResult<()>;

    /// Block until a name or value change happens in this key,
    /// or anywhere below it if `subtree` is set.
    fn watch(&self, subtree: bool) -> StoreResult<()>;
}

/// A store of keys organised under the predefined hives.
pub trait Registry {
    /// Open key type.
    type Key: RegistryKey;

    /// The root key of `hive`.
    fn hive(&self, hive: Hive) -> StoreResult<Self::Key>;

    /// Open `hive\path`.
    fn open(&self, hive: Hive, path: &KeyPath, access: Access) -> StoreResult<Self::Key> {
        self.hive(hive)?.open(path, access)
    }
}
