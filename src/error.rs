//! Error types for the grid world crate

use thiserror::Error;

use crate::environment::Pos;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("invalid grid dimensions {width}x{height}: both must be at least 1")]
    InvalidDimensions { width: usize, height: usize },

    #[error("position ({}, {}) is outside the {width}x{height} grid", .pos.x, .pos.y)]
    OutOfBounds { pos: Pos, width: usize, height: usize },

    #[error("invalid outcome distribution: {message}")]
    InvalidProbability { message: String },

    #[error("invalid world description: {message}")]
    InvalidWorld { message: String },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
