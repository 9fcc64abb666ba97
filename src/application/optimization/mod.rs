// Round-based workflow optimization and multi-instrument scheduling
pub mod acceptance;
pub mod generator;
pub mod optimizer;
pub mod scheduler;

pub use acceptance::{AcceptanceDecision, AcceptancePolicy};
pub use generator::{CandidateGenerator, GeneratedCandidate, GenerationSource};
pub use optimizer::{Optimizer, OptimizerContext};
pub use scheduler::{BatchScheduler, InstrumentRunner, OptimizerRunner};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop flag shared by a session, its optimizers and its
/// scheduler. Work already in flight finishes; nothing new starts.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Reason recorded for rounds and instruments skipped after a stop
pub const STOPPED_REASON: &str = "stopped";

/// Stable per-instrument seed so concurrent runs draw independent streams
pub(crate) fn instrument_seed(base: u64, instrument: &str) -> u64 {
    // FNV-1a
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in instrument.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    base ^ hash
}
