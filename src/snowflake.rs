//! Distributed 64-bit identifier generation
//!
//! Ids are bit-packed, MSB to LSB: 1 sign bit (always 0), 41 bits of
//! milliseconds since the generator epoch, 5 bits of data-center id, 5 bits
//! of worker id, and a 12-bit per-millisecond sequence. The layout is a wire
//! contract; [`recover_timestamp`] is its inverse.
//!
//! One mutex per generator instance is the only serialization point. Small
//! backward clock drift is absorbed by a bounded sleep; drift beyond the
//! tolerance is refused outright rather than risking duplicate ids.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use uuid::Uuid;

use crate::config::MappingConfig;
use crate::error::{MappingError, Result};

/// Generator epoch: 2000-01-01 00:00:00 UTC+8, in unix milliseconds
pub const EPOCH_MILLIS: i64 = 946_656_000_000;

const DATA_CENTER_BITS: u8 = 5;
const WORKER_BITS: u8 = 5;
const SEQUENCE_BITS: u8 = 12;

const MAX_DATA_CENTER_ID: u8 = (1 << DATA_CENTER_BITS) - 1;
const MAX_WORKER_ID: u8 = (1 << WORKER_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

const WORKER_SHIFT: u8 = SEQUENCE_BITS;
const DATA_CENTER_SHIFT: u8 = SEQUENCE_BITS + WORKER_BITS;
const TIMESTAMP_SHIFT: u8 = SEQUENCE_BITS + WORKER_BITS + DATA_CENTER_BITS;

const DEFAULT_TOLERANCE_MS: i64 = 5;

/// Millisecond wall clock, injectable for tests
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// The real wall clock
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

#[derive(Debug)]
struct GeneratorState {
    last_timestamp: i64,
    sequence: i64,
}

/// Snowflake-style id generator
pub struct Snowflake {
    data_center_id: i64,
    worker_id: i64,
    tolerance_ms: i64,
    clock: Arc<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl Snowflake {
    /// Create a generator for one data-center/worker slot
    ///
    /// Both ids must fit their 5-bit fields (0..=31); anything else is a
    /// configuration error at construction, not at generation.
    pub fn new(data_center_id: u8, worker_id: u8) -> Result<Self> {
        if data_center_id > MAX_DATA_CENTER_ID {
            return Err(MappingError::configuration(format!(
                "data center id {} exceeds the maximum of {}",
                data_center_id, MAX_DATA_CENTER_ID
            )));
        }
        if worker_id > MAX_WORKER_ID {
            return Err(MappingError::configuration(format!(
                "worker id {} exceeds the maximum of {}",
                worker_id, MAX_WORKER_ID
            )));
        }
        Ok(Self {
            data_center_id: i64::from(data_center_id),
            worker_id: i64::from(worker_id),
            tolerance_ms: DEFAULT_TOLERANCE_MS,
            clock: Arc::new(SystemClock),
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
            }),
        })
    }

    /// Create a generator from the configured data-center/worker slot
    pub fn from_config(config: &MappingConfig) -> Result<Self> {
        Self::new(config.data_center_id, config.worker_id)
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the backward-drift tolerance (default 5 ms)
    pub fn with_tolerance(mut self, tolerance_ms: i64) -> Self {
        self.tolerance_ms = tolerance_ms;
        self
    }

    /// Generate the next id
    ///
    /// Backward drift within the tolerance sleeps twice the drift and
    /// re-reads the clock; drift beyond it, or drift that persists after the
    /// sleep, is a [`MappingError::ClockRegression`]. A sequence wrap inside
    /// one millisecond spins until the next millisecond.
    pub fn next(&self) -> Result<i64> {
        let mut state = self.state.lock().expect("generator lock poisoned");

        let mut now = self.clock.now_millis();
        if now < state.last_timestamp {
            let drift_ms = state.last_timestamp - now;
            if drift_ms > self.tolerance_ms {
                return Err(MappingError::ClockRegression { drift_ms });
            }
            tracing::warn!(drift_ms, "clock moved backwards, waiting it out");
            thread::sleep(Duration::from_millis((drift_ms as u64) * 2));
            now = self.clock.now_millis();
            if now < state.last_timestamp {
                return Err(MappingError::ClockRegression {
                    drift_ms: state.last_timestamp - now,
                });
            }
        }

        if now == state.last_timestamp {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // Millisecond exhausted; spin to the next one
                while now <= state.last_timestamp {
                    now = self.clock.now_millis();
                }
            }
        } else {
            // Randomized start keeps low-bit sharding even for sparse ids
            state.sequence = rand::thread_rng().gen_range(1..3);
        }
        state.last_timestamp = now;

        Ok(((now - EPOCH_MILLIS) << TIMESTAMP_SHIFT)
            | (self.data_center_id << DATA_CENTER_SHIFT)
            | (self.worker_id << WORKER_SHIFT)
            | state.sequence)
    }
}

/// Extract the unix-millisecond timestamp an id was generated at
pub fn recover_timestamp(id: i64) -> i64 {
    (id >> TIMESTAMP_SHIFT) + EPOCH_MILLIS
}

/// Produces entity identifiers and decides whether one is already assigned
///
/// `is_effective` is the insert-vs-update predicate: an entity whose id is
/// not effective gets a fresh one on insert.
pub trait IdGenerator: Send + Sync {
    type Id;

    fn generate(&self) -> Result<Self::Id>;

    fn is_effective(&self, id: &Self::Id) -> bool;
}

/// Numeric snowflake ids
pub struct SnowflakeGenerator {
    inner: Snowflake,
}

impl SnowflakeGenerator {
    pub fn new(data_center_id: u8, worker_id: u8) -> Result<Self> {
        Ok(Self {
            inner: Snowflake::new(data_center_id, worker_id)?,
        })
    }

    pub fn from_config(config: &MappingConfig) -> Result<Self> {
        Ok(Self {
            inner: Snowflake::from_config(config)?,
        })
    }

    pub fn from_snowflake(inner: Snowflake) -> Self {
        Self { inner }
    }
}

impl IdGenerator for SnowflakeGenerator {
    type Id = i64;

    fn generate(&self) -> Result<i64> {
        self.inner.next()
    }

    fn is_effective(&self, id: &i64) -> bool {
        *id != 0
    }
}

/// Snowflake ids rendered as decimal strings
pub struct SnowflakeStringGenerator {
    inner: Snowflake,
}

impl SnowflakeStringGenerator {
    pub fn new(data_center_id: u8, worker_id: u8) -> Result<Self> {
        Ok(Self {
            inner: Snowflake::new(data_center_id, worker_id)?,
        })
    }

    pub fn from_config(config: &MappingConfig) -> Result<Self> {
        Ok(Self {
            inner: Snowflake::from_config(config)?,
        })
    }

    pub fn from_snowflake(inner: Snowflake) -> Self {
        Self { inner }
    }
}

impl IdGenerator for SnowflakeStringGenerator {
    type Id = String;

    fn generate(&self) -> Result<String> {
        Ok(self.inner.next()?.to_string())
    }

    fn is_effective(&self, id: &String) -> bool {
        !id.is_empty() && id != "0" && id != "null"
    }
}

/// Random UUID ids, for deployments without assigned worker slots
#[derive(Debug, Default)]
pub struct UuidGenerator;

impl IdGenerator for UuidGenerator {
    type Id = String;

    fn generate(&self) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }

    fn is_effective(&self, id: &String) -> bool {
        !id.is_empty() && id != "null"
    }
}
