use thiserror::Error;

/// Errors raised while building or configuring a companion.
///
/// Everything here is a startup-time invariant failure. Day-to-day problems
/// (declined breeding, unreadable save files) are not errors and never reach
/// this type.
#[derive(Error, Debug)]
pub enum CompanionError {
    #[error("constant `{name}` contains non-digit character {ch:?} at position {position}")]
    InvalidDigit {
        name: &'static str,
        ch: char,
        position: usize,
    },

    #[error("constant `{name}` has {found} digits, expected {expected}")]
    ConstantLength {
        name: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CompanionError>;

impl CompanionError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
