//! Neural-network advisory provider.
//!
//! Loads the ACAS Xu network bank from `.nnet` files (one network per
//! previous advisory) and answers quantized decision queries, with a
//! concurrent cache shared by all search workers.

pub mod bank;
pub(crate) mod io;
pub mod nnet;

pub use bank::{network_file_name, NetworkBank, DEFAULT_CACHE_LIMIT, NNET_DIR_ENV};
pub use nnet::NnetNetwork;

use backreach_core::BackreachError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading networks.
#[derive(Error, Debug)]
pub enum NnetError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode gzip: {0}")]
    Gzip(std::io::Error),

    #[error("Failed to decode UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid number '{token}' at token {position}")]
    Parse { token: String, position: usize },

    #[error("Unexpected end of file: needed {needed} more values")]
    Truncated { needed: usize },

    #[error("Invalid network format: {0}")]
    Format(String),

    #[error("Input size mismatch: expected {expected}, got {got}")]
    InputSize { expected: usize, got: usize },

    #[error("No network directory given and BACKREACH_NNET_DIR is not set")]
    NoDirectory,
}

impl From<NnetError> for BackreachError {
    fn from(err: NnetError) -> Self {
        BackreachError::ModelLoad(err.to_string())
    }
}
