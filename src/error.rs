// src/error.rs
//
// Crate error type. Markup itself never produces an error: malformed input is
// always formatted best-effort. Errors come from option loading, the CLI, and
// the embedded-html nesting guard.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid options file: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid value {value:?} for option `{name}`")]
    InvalidOption { name: &'static str, value: String },
    #[error("Embedded html nested {depth} levels deep (limit {limit})")]
    NestingTooDeep { depth: usize, limit: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
