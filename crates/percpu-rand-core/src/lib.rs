//! # percpu-rand-core
//!
//! **One random stream per core, no shared generator state.**
//!
//! `percpu-rand-core` keeps an independent pseudo-random generator in a slot
//! per processor core and serves byte streams from the slot of whichever core
//! the caller runs on. Two backends are available:
//!
//! - **Keyed** (default): a keyed BLAKE3 XOF read as a counter-mode keystream,
//!   rekeyed from the OS CSPRNG after a fixed per-key budget. Several
//!   implementations of the hash are compiled in; the [`Registry`] filters them
//!   by CPU capability and picks one by id, by name, the benchmarked fastest,
//!   or round-robin.
//! - **Xoshiro**: xoshiro256++ seeded once and partitioned across cores with
//!   jump-ahead, so no two cores ever overlap. Fast, not cryptographic.
//!
//! ## Quick Start
//!
//! ```no_run
//! use percpu_rand_core::{Backend, CoreStreams, StreamConfig};
//!
//! let config = StreamConfig { backend: Backend::Keyed, ..StreamConfig::default() };
//! let streams = CoreStreams::init(&config)?;
//!
//! let mut bytes = [0u8; 64];
//! streams.fill(&mut bytes)?;
//!
//! let mut out = Vec::new();
//! streams.read(&mut out, 4096)?;
//! assert_eq!(out.len(), 4096);
//! # Ok::<(), percpu_rand_core::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Registry → Keystream (per core) ─┐
//!                                  ├→ CoreArena slot → read / fill
//! Xoshiro256++ (per core) ─────────┘
//!
//! Generator state and keys are only reachable through [`CoreStreams`]; they
//! are wiped on drop and never appear in `Debug` output.

pub mod bench;
pub mod config;
pub mod entropy;
pub mod error;
pub mod hash;
pub mod keystream;
pub mod percpu;
pub mod registry;
pub mod streams;
pub mod xoshiro;

pub use bench::{VariantThroughput, measure, record_fastest, select_fastest};
pub use config::{Backend, DEFAULT_BENCH_ROUNDS, StreamConfig};
pub use entropy::{OsEntropy, SecureRandom};
pub use error::{Error, Result};
pub use hash::{KeyedContext, KeyedHash};
pub use keystream::{DEFAULT_CHUNK_SIZE, DEFAULT_MAX_PER_KEY, Keystream, KeystreamLimits};
pub use registry::{Registry, Selection, registry};
pub use streams::CoreStreams;
pub use xoshiro::Xoshiro256PlusPlus;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
