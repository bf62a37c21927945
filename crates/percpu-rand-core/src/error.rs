//! Error taxonomy for stream initialization, selection, and delivery.
//!
//! Seed and allocation failures are fatal to initialization and are never
//! retried. Refills, rekeys and state advancement are not errors at all: they
//! happen inside `serve` and always succeed.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The secure random source failed or returned a degenerate value.
    #[error("secure random source unavailable: {reason}")]
    SeedUnavailable { reason: String },

    /// Per-core generator state could not be allocated.
    #[error("could not allocate {bytes} bytes of generator state")]
    AllocationFailure { bytes: usize },

    /// A selection name matched no reserved keyword and no supported variant.
    #[error("unknown implementation variant '{name}'")]
    UnknownVariantName { name: String },

    /// The byte sink stopped accepting output part-way through a read.
    #[error("delivery failed after {delivered} bytes: {source}")]
    DeliveryFault {
        delivered: usize,
        #[source]
        source: std::io::Error,
    },

    /// The per-core streams were already torn down.
    #[error("per-core streams have been torn down")]
    TornDown,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
