#![allow(missing_docs)]

//! Pull key flags out of the text printed by the flags tool.
//!
//! `reg FLAGS <key> QUERY` prints something like
//! ```text
//! REG_KEY_DONT_VIRTUALIZE: 0
//! REG_KEY_DONT_SILENT_FAIL: 1
//! REG_KEY_RECURSE_FLAG: 0
//! ```
//! Each flag is looked up on its own from the start of the text, so the tool
//! may print them in any order.

use std::fmt;

use crate::channel::{CommandLine, ProcessChannel};
use crate::error::{RegistryError, RegistryResult};
use crate::path::KeyPath;
use crate::store::Hive;

/// Characters that separate a flag name from its value, and end the value.
pub const DELIMITERS: [char; 5] = [':', ' ', '\r', '\t', '\n'];

/// Placeholder in a flags command template that is replaced by the key.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// The flags regkit knows about, in the order they are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagName {
    DontVirtualize,
    DontSilentFail,
    RecurseFlag,
}

impl FlagName {
    /// Every flag, in reporting order.
    pub const ALL: [FlagName; 3] = [
        FlagName::DontVirtualize,
        FlagName::DontSilentFail,
        FlagName::RecurseFlag,
    ];

    /// The name as the flags tool prints it.
    pub fn as_str(self) -> &'static str {
        match self {
            FlagName::DontVirtualize => "REG_KEY_DONT_VIRTUALIZE",
            FlagName::DontSilentFail => "REG_KEY_DONT_SILENT_FAIL",
            FlagName::RecurseFlag => "REG_KEY_RECURSE_FLAG",
        }
    }
}

impl fmt::Display for FlagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flag and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagRecord {
    pub name: FlagName,
    pub value: String,
}

/// A complete set of extracted flags, in the order they were asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet(Vec<FlagRecord>);

impl FlagSet {
    pub fn iter(&self) -> std::slice::Iter<'_, FlagRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value of `name`, if it was part of the extraction.
    pub fn get(&self, name: FlagName) -> Option<&str> {
        self.0
            .iter()
            .find(|r| r.name == name)
            .map(|r| r.value.as_str())
    }
}

impl<'a> IntoIterator for &'a FlagSet {
    type Item = &'a FlagRecord;
    type IntoIter = std::slice::Iter<'a, FlagRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Find the value of every flag in `names` within `text`.
///
/// The value of a flag is the first run of non-delimiter characters after
/// the first occurrence of its name. Either every flag is found or the call
/// fails.
pub fn extract_flags(text: &str, names: &[FlagName]) -> RegistryResult<FlagSet> {
    names
        .iter()
        .map(|&name| {
            let at = text
                .find(name.as_str())
                .ok_or(RegistryError::FlagNotFound(name))?;
            let value = text[at + name.as_str().len()..]
                .split(DELIMITERS)
                .find(|token| !token.is_empty())
                .ok_or(RegistryError::FlagValueMissing(name))?;
            Ok(FlagRecord {
                name,
                value: value.to_string(),
            })
        })
        .collect::<RegistryResult<Vec<_>>>()
        .map(FlagSet)
}

/// Build the flags query for `hive\path` from a command template.
/// Every `{key}` in the template is replaced by the full key name.
pub fn flags_query(template: &[String], hive: Hive, path: &KeyPath) -> RegistryResult<CommandLine> {
    let key = hive.key_name(path);
    let mut words = template.iter().map(|w| w.replace(KEY_PLACEHOLDER, &key));
    let program = words
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| RegistryError::InvalidArgument("the flags command is empty".into()))?;
    Ok(words.fold(CommandLine::new(program), CommandLine::arg))
}

/// Run the flags tool for `hive\path` and extract every known flag.
#[tracing::instrument(skip(channel, template))]
pub async fn query_flags(
    channel: &ProcessChannel,
    template: &[String],
    hive: Hive,
    path: &KeyPath,
) -> RegistryResult<FlagSet> {
    let command = flags_query(template, hive, path)?;
    let output = channel.run(&command).await?;
    if output.exit_code() != Some(0) {
        tracing::debug!(exit_code = ?output.exit_code(), "flags tool reported a failure");
    }
    extract_flags(&output.text(), &FlagName::ALL)
}
