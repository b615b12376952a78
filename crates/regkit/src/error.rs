#![allow(missing_docs)]

use std::collections::TryReserveError;

use thiserror::Error;

use crate::accumulate::AppendError;
use crate::channel::ChannelError;
use crate::config::ConfigError;
use crate::flags::FlagName;
use crate::store::StoreError;

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Everything that can go wrong inside the search and flag engine.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Could not reach key '{path}': {source}")]
    NodeUnreachable {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Out of memory growing a list of {len} paths by {additional}")]
    AllocationFailure {
        len: usize,
        additional: usize,
        #[source]
        source: TryReserveError,
    },

    #[error(transparent)]
    ProcessChannel(#[from] ChannelError),

    #[error("Flag {0} was not found in the tool output")]
    FlagNotFound(FlagName),

    #[error("Flag {0} has no value in the tool output")]
    FlagValueMissing(FlagName),

    #[error("Key '{0}' already exists")]
    KeyExists(String),

    #[error("No keys were enumerated below the search root")]
    NoNodesEnumerated,

    #[error("Key '{path}' is nested deeper than the limit of {max_depth}")]
    DepthExceeded { path: String, max_depth: usize },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("There is no native registry on this platform, use --snapshot to work on a snapshot file")]
    NoNativeRegistry,
}

impl From<AppendError> for RegistryError {
    fn from(e: AppendError) -> Self {
        RegistryError::AllocationFailure {
            len: e.list.len(),
            additional: e.additional,
            source: e.source,
        }
    }
}
