//! Shared virtual clock.
//!
//! All simulated devices read time from one `SimClock`. Time only moves when
//! something advances it: a `SimDelay`, or a stepper waiting for its move to
//! complete. Devices that react to time (the limit switch) register an
//! advance listener.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::driver::Delay;

type Listener = Box<dyn Fn(u64) + Send + Sync>;

struct ClockInner {
    now_us: AtomicU64,
    seq: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

/// Cloneable handle to the virtual clock.
#[derive(Clone)]
pub struct SimClock {
    inner: Arc<ClockInner>,
}

impl std::fmt::Debug for SimClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimClock")
            .field("now_us", &self.now_us())
            .finish()
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ClockInner {
                now_us: AtomicU64::new(0),
                seq: AtomicU64::new(0),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current virtual time [µs].
    #[inline]
    pub fn now_us(&self) -> u64 {
        self.inner.now_us.load(Ordering::Acquire)
    }

    /// Monotonic event sequence number shared by all devices on this clock.
    #[inline]
    pub fn next_seq(&self) -> u64 {
        self.inner.seq.fetch_add(1, Ordering::AcqRel)
    }

    /// Move time forward by `us` and notify listeners.
    pub fn advance_us(&self, us: u64) {
        let now = self.inner.now_us.fetch_add(us, Ordering::AcqRel) + us;
        let listeners = self.inner.listeners.lock();
        for listener in listeners.iter() {
            listener(now);
        }
    }

    /// Move time forward to `target_us` if it lies in the future.
    pub fn advance_to(&self, target_us: u64) {
        let now = self.now_us();
        if target_us > now {
            self.advance_us(target_us - now);
        }
    }

    /// Register a callback run after every advance. Listeners must not
    /// advance the clock themselves.
    pub fn on_advance<F>(&self, listener: F)
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.inner.listeners.lock().push(Box::new(listener));
    }
}

/// `Delay` that advances the virtual clock instead of sleeping.
#[derive(Debug, Clone)]
pub struct SimDelay {
    clock: SimClock,
}

impl SimDelay {
    pub fn new(clock: SimClock) -> Self {
        Self { clock }
    }
}

impl Delay for SimDelay {
    fn delay_ms(&mut self, ms: u64) {
        self.clock.advance_us(ms.saturating_mul(1_000));
    }
}
