//! Autotelos Entropy - pooled external randomness with a local fallback
//!
//! Bytes come from an external true-random source and are buffered in a
//! bounded pool. Draws never block on the network: an empty pool degrades
//! to a time-seeded PRNG and the result is tagged with its provenance.

pub mod error;
pub mod pool;
pub mod source;

pub use error::{EntropyError, EntropyResult};
pub use pool::{Draw, EntropyConfig, EntropyPool, Provenance};
pub use source::{ByteSource, QrngSource};
