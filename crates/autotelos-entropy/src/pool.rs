//! Bounded byte pool with asynchronous, rate-limited refill

use crate::error::EntropyResult;
use crate::source::{ByteSource, QrngSource};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Bytes consumed per float draw.
const DRAW_BYTES: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    /// Use the external source. When false every draw is fallback.
    pub enabled: bool,
    pub base_url: String,
    pub capacity: usize,
    /// Refill is triggered once the pool holds fewer bytes than this.
    pub low_water: usize,
    /// Minimum seconds between two fetches.
    pub min_refill_secs: f64,
    pub timeout_secs: u64,
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://qrng.anu.edu.au".to_string(),
            capacity: 256,
            low_water: 64,
            min_refill_secs: 5.0,
            timeout_secs: 10,
        }
    }
}

/// Where a drawn value came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    External,
    Fallback,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::External => "external",
            Provenance::Fallback => "fallback",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Draw {
    /// Uniform in [0, 1).
    pub value: f64,
    pub source: Provenance,
}

struct PoolState {
    source: Option<Arc<dyn ByteSource>>,
    bytes: Mutex<VecDeque<u8>>,
    capacity: usize,
    low_water: usize,
    min_refill: Duration,
    last_refill: Mutex<Option<Instant>>,
    refilling: AtomicBool,
    fallback: Mutex<StdRng>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cheap to clone; clones share one pool.
#[derive(Clone)]
pub struct EntropyPool {
    state: Arc<PoolState>,
}

impl EntropyPool {
    pub fn new(source: Option<Arc<dyn ByteSource>>, config: &EntropyConfig) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let capacity = config.capacity.max(DRAW_BYTES);
        let min_refill = if config.min_refill_secs.is_finite() && config.min_refill_secs > 0.0 {
            Duration::from_secs_f64(config.min_refill_secs)
        } else {
            Duration::ZERO
        };

        Self {
            state: Arc::new(PoolState {
                source,
                bytes: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                low_water: config.low_water.min(capacity),
                min_refill,
                last_refill: Mutex::new(None),
                refilling: AtomicBool::new(false),
                fallback: Mutex::new(StdRng::seed_from_u64(seed)),
            }),
        }
    }

    /// Build the pool described by `config`, wiring a [`QrngSource`] when
    /// enabled.
    pub fn from_config(config: &EntropyConfig) -> EntropyResult<Self> {
        let source: Option<Arc<dyn ByteSource>> = if config.enabled {
            let qrng = QrngSource::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
            Some(Arc::new(qrng))
        } else {
            None
        };
        Ok(Self::new(source, config))
    }

    /// A pool with no external source. Every draw is fallback.
    pub fn fallback_only() -> Self {
        Self::new(None, &EntropyConfig::default())
    }

    pub fn available(&self) -> usize {
        lock(&self.state.bytes).len()
    }

    pub fn capacity(&self) -> usize {
        self.state.capacity
    }

    /// Draw a uniform value in [0, 1). Never blocks on the network.
    pub fn get_float(&self) -> Draw {
        let (popped, remaining) = {
            let mut bytes = lock(&self.state.bytes);
            let popped = if bytes.len() >= DRAW_BYTES {
                let mut buf = [0u8; DRAW_BYTES];
                for (slot, b) in buf.iter_mut().zip(bytes.drain(..DRAW_BYTES)) {
                    *slot = b;
                }
                Some(buf)
            } else {
                None
            };
            (popped, bytes.len())
        };

        if remaining < self.state.low_water {
            self.spawn_refill();
        }

        match popped {
            Some(buf) => Draw {
                value: unit_from_bytes(buf),
                source: Provenance::External,
            },
            None => {
                let value = lock(&self.state.fallback).gen::<f64>();
                trace!("entropy pool short, fallback draw");
                Draw {
                    value,
                    source: Provenance::Fallback,
                }
            }
        }
    }

    /// `base` jittered by a symmetric offset in [-max_delta, +max_delta].
    pub fn temperature_delta(&self, base: f64, max_delta: f64) -> f64 {
        let draw = self.get_float();
        let offset = (draw.value * 2.0 - 1.0) * max_delta.abs();
        trace!(
            "temperature {:.3} -> {:.3} ({})",
            base,
            base + offset,
            draw.source.as_str()
        );
        base + offset
    }

    /// Refill now and wait for it. Returns the number of bytes added; zero
    /// when another refill is in flight, the pool is full, or the minimum
    /// interval has not elapsed.
    pub async fn fill_now(&self) -> EntropyResult<usize> {
        if !self.state.try_begin_refill() {
            return Ok(0);
        }
        let result = self.state.refill().await;
        self.state.refilling.store(false, Ordering::Release);
        result
    }

    fn spawn_refill(&self) {
        if self.state.source.is_none() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if !self.state.try_begin_refill() {
            return;
        }
        let state = self.state.clone();
        handle.spawn(async move {
            if let Err(e) = state.refill().await {
                warn!("entropy refill failed: {}", e);
            }
            state.refilling.store(false, Ordering::Release);
        });
    }
}

impl PoolState {
    fn try_begin_refill(&self) -> bool {
        self.refilling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    async fn refill(&self) -> EntropyResult<usize> {
        let Some(source) = self.source.clone() else {
            return Ok(0);
        };

        {
            let mut last = lock(&self.last_refill);
            if let Some(at) = *last {
                if at.elapsed() < self.min_refill {
                    return Ok(0);
                }
            }
            *last = Some(Instant::now());
        }

        let needed = self.capacity.saturating_sub(lock(&self.bytes).len());
        if needed == 0 {
            return Ok(0);
        }

        let fetched = source.fetch(needed).await?;

        // Consumers may have drained the pool meanwhile; never exceed capacity.
        let mut bytes = lock(&self.bytes);
        let room = self.capacity.saturating_sub(bytes.len());
        let added = fetched.len().min(room);
        bytes.extend(fetched.into_iter().take(added));
        debug!(
            "entropy refill from {}: +{} bytes ({} available)",
            source.name(),
            added,
            bytes.len()
        );
        Ok(added)
    }
}

/// Top 53 bits of a big-endian u64 scaled into [0, 1).
fn unit_from_bytes(buf: [u8; DRAW_BYTES]) -> f64 {
    let bits = u64::from_be_bytes(buf) >> 11;
    bits as f64 / (1u64 << 53) as f64
}
