use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::SaleError;
use crate::types::Tick;

/// Source of the external ledger's tick counter.
///
/// The engine never reads wall time; every temporal rule is a comparison
/// against the value returned here.
pub trait TickSource: Send + Sync {
    fn current_tick(&self) -> Tick;
}

/// Monotonic logical clock driven by whoever presents calls to the engine.
///
/// The node moves it to the tick stamped on each envelope; tests push it
/// forward with `advance`.
#[derive(Debug, Default)]
pub struct LogicalClock {
    tick: AtomicU64,
}

impl LogicalClock {
    pub fn new(start: Tick) -> Self {
        Self { tick: AtomicU64::new(start) }
    }

    /// Move forward by `ticks`, stopping at `Tick::MAX`. Returns the new tick.
    pub fn advance(&self, ticks: Tick) -> Tick {
        let previous = self
            .tick
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |t| Some(t.saturating_add(ticks)))
            .unwrap_or_else(|t| t);
        previous.saturating_add(ticks)
    }

    /// Move to `tick`, which must not precede the current one.
    pub fn advance_to(&self, tick: Tick) -> Result<(), SaleError> {
        let last = self.tick.load(Ordering::SeqCst);
        if tick < last {
            return Err(SaleError::TickRegression { last, got: tick });
        }
        self.tick.store(tick, Ordering::SeqCst);
        Ok(())
    }
}

impl TickSource for LogicalClock {
    fn current_tick(&self) -> Tick {
        self.tick.load(Ordering::SeqCst)
    }
}
