use std::path::PathBuf;

use thiserror::Error;

pub type PanResult<T> = Result<T, PanError>;

/// Error kinds surfaced by the library.
///
/// `Validation` aborts a run before any work is done, `Invariant` reports a
/// broken internal contract and is not recoverable, `Io` wraps stream
/// failures (partial output may exist), `Aligner` reports a failed or
/// malformed alignment of a single block.
#[derive(Error, Debug)]
pub enum PanError {
    #[error("{0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    Invariant(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    IoStream(#[from] std::io::Error),
    #[error("aligner failed: {0}")]
    Aligner(String),
}

impl PanError {
    pub fn io<P: Into<PathBuf>>(path: P, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    /// Exit code for the process, see the external interface contract.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 255,
            _ => 1,
        }
    }
}

#[macro_export]
macro_rules! validate {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Err($crate::errs::PanError::Validation(format!($($arg)+)));
        }
    };
}
