use std::num::ParseIntError;
use thiserror::Error;

/// Configuration errors. All of them are fatal to startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid size value {value:?}: {source}")]
    InvalidSize {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Invalid integer for {name}: {value:?}: {source}")]
    InvalidInteger {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Suffix {suffix:?} has length {found}, expected {expected}")]
    SuffixLength {
        suffix: String,
        expected: usize,
        found: usize,
    },

    #[error("Size value {0:?} overflows a 64-bit byte count")]
    Overflow(String),

    #[error("Config load error: {0}")]
    Load(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

/// Unified error type for building a logger.
#[derive(Error, Debug)]
pub enum ReqlogError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReqlogError {
    /// True when the failure came from configuration rather than the filesystem.
    pub fn is_config(&self) -> bool {
        matches!(self, ReqlogError::Config(_))
    }
}
