#![deny(missing_docs)]
//! The `regkit` command line.
//!
//! Every command ends by printing one status line: `Ok!`, `Error!`, or for a
//! search below an empty key, `No keys found!`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use regkit_trace::Output;

use crate::config::RegkitConfig;
use crate::error::{RegistryError, RegistryResult};
use crate::flags::query_flags;
use crate::path::KeyPath;
use crate::search::find_nodes;
use crate::store::{Access, Disposition, Hive, MemoryRegistry, RegValue, Registry, RegistryKey};

/// Create, search, watch and query flags of registry keys.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Regkit {
    /// YAML config file.
    #[arg(long, env = "REGKIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Work on this YAML registry snapshot instead of the live registry.
    /// Overrides `snapshot` from the config.
    #[arg(long, env = "REGKIT_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Log output format, used when `RUST_LOG` is set.
    /// One of `Log`, `Compact`, `Json` or `None`.
    #[arg(long, default_value_t = Output::Log)]
    pub structured: Output,

    /// The command to run.
    #[command(subcommand)]
    pub op: Op,
}

// Docs have different use for clap
// so documenting everything doesn't make sense.
#[allow(missing_docs)]
#[derive(Debug, Subcommand, Clone)]
pub enum Op {
    /// Create a new key. Fails if the key already exists.
    #[command(name = "ADD_KEY", alias = "add-key")]
    AddKey(AddKey),
    /// Set a value on a key, creating the key if needed.
    #[command(name = "ADD_VALUE", alias = "add-value")]
    AddValue(AddValue),
    /// Print the virtualization flags of a key.
    #[command(name = "VIEW_FLAGS", alias = "view-flags")]
    ViewFlags(ViewFlags),
    /// List every key below a key that matches a term.
    #[command(name = "SEARCH_KEY", alias = "search-key")]
    SearchKey(SearchKey),
    /// Wait for a change anywhere below a key.
    #[command(name = "NOTIFY", alias = "notify")]
    Notify(Notify),
}

/// A key to work on.
#[derive(Debug, Args, Clone)]
pub struct KeyArgs {
    /// Root key, e.g. `HKEY_LOCAL_MACHINE` or `HKLM`.
    pub hive: String,
    /// Path below the root key, e.g. `SOFTWARE\TEST`.
    pub path: String,
}

impl KeyArgs {
    fn parse(&self) -> RegistryResult<(Hive, KeyPath)> {
        let hive = self.hive.parse().map_err(RegistryError::InvalidArgument)?;
        Ok((hive, KeyPath::parse(&self.path)))
    }
}

/// Arguments of `ADD_KEY`.
#[derive(Debug, Args, Clone)]
pub struct AddKey {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,
}

/// Arguments of `ADD_VALUE`.
#[derive(Debug, Args, Clone)]
pub struct AddValue {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,
    /// Name of the value.
    pub name: String,
    /// One of `REG_SZ`, `REG_BINARY`, `REG_DWORD` or `REG_LINK`.
    pub kind: String,
    /// The data. `REG_DWORD` takes a decimal number.
    pub data: String,
}

/// Arguments of `VIEW_FLAGS`.
#[derive(Debug, Args, Clone)]
pub struct ViewFlags {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,
    /// Kill the flags tool after this many seconds.
    /// Overrides `timeout_secs` from the config.
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments of `SEARCH_KEY`.
#[derive(Debug, Args, Clone)]
pub struct SearchKey {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,
    /// Matches a key whose path has the term right before a separator or at the end.
    pub term: String,
}

/// Arguments of `NOTIFY`.
#[derive(Debug, Args, Clone)]
pub struct Notify {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub key: KeyArgs,
}

/// How a successful command ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// `Ok!`
    Ok,
    /// `No keys found!`
    NoKeysFound,
}

/// A command that works on a registry.
trait RegistryCommand {
    fn apply<R: Registry>(&self, registry: &R, config: &RegkitConfig) -> RegistryResult<Status>;
}

impl RegistryCommand for AddKey {
    fn apply<R: Registry>(&self, registry: &R, _config: &RegkitConfig) -> RegistryResult<Status> {
        let (hive, path) = self.key.parse()?;
        match registry.hive(hive)?.create(&path)? {
            Disposition::CreatedNew => Ok(Status::Ok),
            Disposition::OpenedExisting => {
                Err(RegistryError::KeyExists(hive.key_name(&path)))
            }
        }
    }
}

impl RegistryCommand for AddValue {
    fn apply<R: Registry>(&self, registry: &R, _config: &RegkitConfig) -> RegistryResult<Status> {
        let (hive, path) = self.key.parse()?;
        let kind = self.kind.parse().map_err(RegistryError::InvalidArgument)?;
        let value = RegValue::parse(kind, &self.data)?;
        registry.hive(hive)?.set_value(&path, &self.name, &value)?;
        tracing::info!(key = %hive.key_name(&path), name = %self.name, %value, "value set");
        Ok(Status::Ok)
    }
}

impl RegistryCommand for SearchKey {
    fn apply<R: Registry>(&self, registry: &R, config: &RegkitConfig) -> RegistryResult<Status> {
        let (hive, path) = self.key.parse()?;
        let root = registry.open(hive, &path, Access::Read)?;
        let found = match find_nodes(&config.enumerator(), &root, &self.term) {
            Ok(found) => found,
            Err(RegistryError::NoNodesEnumerated) => return Ok(Status::NoKeysFound),
            Err(e) => return Err(e),
        };
        println!("Search result in {}\\:", hive.key_name(&path));
        for (i, key) in found.iter().enumerate() {
            println!("{i}. {key}");
        }
        Ok(Status::Ok)
    }
}

impl RegistryCommand for Notify {
    fn apply<R: Registry>(&self, registry: &R, _config: &RegkitConfig) -> RegistryResult<Status> {
        let (hive, path) = self.key.parse()?;
        let key = registry.open(hive, &path, Access::Notify)?;
        crate::msg!("Watching {} for changes", hive.key_name(&path));
        key.watch(true)?;
        Ok(Status::Ok)
    }
}

impl ViewFlags {
    async fn run(&self, config: &RegkitConfig) -> RegistryResult<Status> {
        let (hive, path) = self.key.parse()?;
        let timeout = self
            .timeout
            .map(Duration::from_secs)
            .or_else(|| config.timeout());
        let channel = config.channel().with_timeout(timeout);
        let flags = query_flags(&channel, &config.flags_command, hive, &path).await?;
        println!("Key flags:");
        for (i, flag) in flags.iter().enumerate() {
            println!("{i}. Flag name: {}  Flag value: {}", flag.name, flag.value);
        }
        Ok(Status::Ok)
    }
}

/// Apply `cmd` to the snapshot if there is one, otherwise to the live registry.
fn with_registry<C: RegistryCommand>(
    cmd: &C,
    snapshot: Option<&Path>,
    config: &RegkitConfig,
) -> RegistryResult<Status> {
    match snapshot {
        Some(file) => cmd.apply(&MemoryRegistry::load(file)?, config),
        None => with_native_registry(cmd, config),
    }
}

#[cfg(windows)]
fn with_native_registry<C: RegistryCommand>(cmd: &C, config: &RegkitConfig) -> RegistryResult<Status> {
    cmd.apply(&crate::store::NativeRegistry, config)
}

#[cfg(not(windows))]
fn with_native_registry<C: RegistryCommand>(_cmd: &C, _config: &RegkitConfig) -> RegistryResult<Status> {
    Err(RegistryError::NoNativeRegistry)
}

impl Regkit {
    /// Run the command and print its status line.
    pub async fn run(self) -> anyhow::Result<()> {
        match self.execute().await {
            Ok(Status::Ok) => println!("Ok!"),
            Ok(Status::NoKeysFound) => println!("No keys found!"),
            Err(e) => {
                println!("Error!");
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn execute(&self) -> RegistryResult<Status> {
        let config = RegkitConfig::load(self.config.as_deref())?;
        let snapshot = self.snapshot.as_deref().or(config.snapshot.as_deref());
        match &self.op {
            Op::AddKey(cmd) => with_registry(cmd, snapshot, &config),
            Op::AddValue(cmd) => with_registry(cmd, snapshot, &config),
            Op::ViewFlags(cmd) => cmd.run(&config).await,
            Op::SearchKey(cmd) => with_registry(cmd, snapshot, &config),
            Op::Notify(cmd) => with_registry(cmd, snapshot, &config),
        }
    }
}
