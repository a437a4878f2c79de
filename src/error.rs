use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Failure of a single numeric field conversion.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumberError {
    #[error("invalid number {value:?}: {reason}")]
    Invalid { value: String, reason: &'static str },

    #[error("{value:?} has {digits} fractional digits but only {scale} fit without truncation")]
    PrecisionLoss {
        value: String,
        digits: usize,
        scale: u32,
    },

    #[error("scale {scale} does not fit in 256 bits")]
    ScaleOutOfRange { scale: u32 },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed input {}: {reason}", .path.display())]
    MalformedInput { path: PathBuf, reason: String },

    #[error("line {line}: invalid address {value:?}: {reason}")]
    InvalidAddress {
        line: u64,
        value: String,
        reason: String,
    },

    #[error("line {line}, field {field}: {source}")]
    Number {
        line: u64,
        field: &'static str,
        #[source]
        source: NumberError,
    },

    #[error("submission failed: {detail}")]
    Submission {
        tx_hash: Option<String>,
        detail: String,
    },

    #[error("transaction {tx_hash} not confirmed within {waited:?}")]
    ConfirmationTimeout { tx_hash: String, waited: Duration },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Coarse classification surfaced to the operator and used for exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedInput,
    InvalidNumber,
    PrecisionLoss,
    Submission,
    ConfirmationTimeout,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedInput { .. } | Error::InvalidAddress { .. } => {
                ErrorKind::MalformedInput
            }
            Error::Number {
                source: NumberError::Invalid { .. },
                ..
            } => ErrorKind::InvalidNumber,
            Error::Number {
                source: NumberError::PrecisionLoss { .. },
                ..
            } => ErrorKind::PrecisionLoss,
            Error::Number {
                source: NumberError::ScaleOutOfRange { .. },
                ..
            } => ErrorKind::Config,
            Error::Submission { .. } => ErrorKind::Submission,
            Error::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    /// Hash of a transaction that already left this process, if any.
    pub fn tx_hash(&self) -> Option<&str> {
        match self {
            Error::Submission { tx_hash, .. } => tx_hash.as_deref(),
            Error::ConfirmationTimeout { tx_hash, .. } => Some(tx_hash),
            _ => None,
        }
    }

    pub(crate) fn submission(detail: impl ToString) -> Self {
        Error::Submission {
            tx_hash: None,
            detail: detail.to_string(),
        }
    }
}

impl ErrorKind {
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::ConfirmationTimeout => 2,
            _ => 1,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::MalformedInput => "MalformedInputError",
            ErrorKind::InvalidNumber => "InvalidNumberError",
            ErrorKind::PrecisionLoss => "PrecisionLossError",
            ErrorKind::Submission => "SubmissionError",
            ErrorKind::ConfirmationTimeout => "ConfirmationTimeoutError",
            ErrorKind::Config => "ConfigError",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
