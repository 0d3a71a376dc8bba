//! Resizable concurrency limiter.
//!
//! Wraps a Tokio semaphore whose permit count can be changed while permits
//! are held. Growing adds permits immediately. Shrinking takes idle permits
//! out of circulation and records the remainder as debt; each permit
//! released while debt remains is retired instead of returned.
//!
//! ```text
//! limit 4, 4 held ── resize(2) ──► debt 2
//!     release ─► retired (debt 1)
//!     release ─► retired (debt 0)
//!     release ─► returned to semaphore
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

#[derive(Debug)]
struct Capacity {
    limit: usize,
    debt: usize,
}

/// Accounting shared between the limiter and its outstanding permits.
#[derive(Debug)]
struct Slots {
    capacity: Mutex<Capacity>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl Slots {
    fn update_peak(&self, current: usize) {
        let mut peak = self.peak_in_flight.load(Ordering::Relaxed);
        while current > peak {
            match self.peak_in_flight.compare_exchange_weak(
                peak,
                current,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(p) => peak = p,
            }
        }
    }

    /// Returns true if a released permit should be retired.
    fn take_debt(&self) -> bool {
        let mut capacity = self.capacity.lock();
        if capacity.debt > 0 {
            capacity.debt -= 1;
            true
        } else {
            false
        }
    }
}

/// Semaphore-based limiter with a runtime-adjustable limit.
///
/// Permits are owned, so they can be moved into blocking work and outlive
/// the future that acquired them.
#[derive(Debug)]
pub struct AdmissionSemaphore {
    semaphore: Arc<Semaphore>,
    slots: Arc<Slots>,
}

impl AdmissionSemaphore {
    /// Creates a limiter allowing `limit` concurrent holders (at least one).
    pub fn new(limit: usize) -> Self {
        let limit = clamp_limit(limit);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            slots: Arc::new(Slots {
                capacity: Mutex::new(Capacity { limit, debt: 0 }),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }),
        }
    }

    /// Waits for a permit.
    ///
    /// Fails only if the semaphore has been closed.
    pub async fn acquire(&self) -> Result<AdmissionPermit, AcquireError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        Ok(self.track(permit))
    }

    /// Takes a permit if one is free.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        Some(self.track(permit))
    }

    /// Changes the number of concurrent holders allowed.
    ///
    /// Holders above a reduced limit keep their permits until they finish.
    pub fn resize(&self, limit: usize) {
        let limit = clamp_limit(limit);
        let mut capacity = self.slots.capacity.lock();
        let previous = capacity.limit;

        if limit > previous {
            let grow = limit - previous;
            let repaid = grow.min(capacity.debt);
            capacity.debt -= repaid;
            self.semaphore.add_permits(grow - repaid);
        } else {
            let shrink = previous - limit;
            let mut retired = 0;
            while retired < shrink {
                match self.semaphore.try_acquire() {
                    Ok(permit) => {
                        permit.forget();
                        retired += 1;
                    }
                    Err(_) => break,
                }
            }
            capacity.debt += shrink - retired;
        }

        capacity.limit = limit;
        debug!(
            previous,
            limit,
            debt = capacity.debt,
            "Resized admission semaphore"
        );
    }

    /// Returns the current limit.
    pub fn limit(&self) -> usize {
        self.slots.capacity.lock().limit
    }

    /// Returns the current number of permit holders.
    pub fn in_flight(&self) -> usize {
        self.slots.in_flight.load(Ordering::Relaxed)
    }

    /// Returns the peak number of concurrent holders observed.
    pub fn peak_in_flight(&self) -> usize {
        self.slots.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Returns the number of permits that can be acquired without waiting.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Resets the peak counter (useful for periodic stats).
    pub fn reset_peak(&self) {
        self.slots.peak_in_flight.store(0, Ordering::Relaxed);
    }

    fn track(&self, permit: OwnedSemaphorePermit) -> AdmissionPermit {
        let current = self.slots.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.slots.update_peak(current);
        AdmissionPermit {
            permit: Some(permit),
            slots: Arc::clone(&self.slots),
        }
    }
}

fn clamp_limit(limit: usize) -> usize {
    if limit == 0 {
        warn!("Concurrency limit of 0 would stall every request, using 1");
        1
    } else {
        limit
    }
}

/// A held slot. Released (or retired) when dropped.
#[derive(Debug)]
pub struct AdmissionPermit {
    permit: Option<OwnedSemaphorePermit>,
    slots: Arc<Slots>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.slots.in_flight.fetch_sub(1, Ordering::Relaxed);
        if let Some(permit) = self.permit.take() {
            if self.slots.take_debt() {
                permit.forget();
            }
        }
    }
}
