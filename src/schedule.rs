//! Per-tick polling and unit cadence.
//!
//! The scheduler runs every unit's read/format once per tick, with one tokio
//! task per due unit so a slow read never serializes behind another unit's
//! I/O. Results are joined back into configured position order before the
//! line is emitted; completion order never leaks onto the wire.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::warn;

use crate::chunk::{Chunk, ChunkBuilder};
use crate::unit::UnitSlot;

/// Drives one tick's worth of unit polls and caches chunks between
/// refreshes of slow-cadence units.
#[derive(Debug)]
pub struct Scheduler {
    builder: Arc<ChunkBuilder>,
    cache: Vec<CacheEntry>,
}

#[derive(Debug, Default)]
struct CacheEntry {
    chunk: Option<Chunk>,
    refreshed_at: Option<Instant>,
}

impl Scheduler {
    pub fn new(builder: ChunkBuilder, unit_count: usize) -> Self {
        let mut cache = Vec::with_capacity(unit_count);
        cache.resize_with(unit_count, CacheEntry::default);
        Self {
            builder: Arc::new(builder),
            cache,
        }
    }

    /// Poll all units for one tick, returning chunks in position order.
    ///
    /// Units due for refresh are polled concurrently; the rest reuse their
    /// cached chunk, with any pending transient override (e.g. set by a
    /// click between polls) taken and folded in. A unit whose poll task
    /// panics degrades to an error chunk like any other per-unit failure.
    pub async fn poll_all(&mut self, slots: &[UnitSlot]) -> Vec<Chunk> {
        let now = Instant::now();

        let mut pending = Vec::new();
        for (ix, slot) in slots.iter().enumerate() {
            if !self.is_due(ix, slot, now) {
                continue;
            }
            let unit = slot.handle();
            let builder = Arc::clone(&self.builder);
            pending.push((
                ix,
                tokio::spawn(async move {
                    let mut unit = unit.lock().await;
                    builder.build(&mut unit).await
                }),
            ));
        }

        let mut out: Vec<Option<Chunk>> = vec![None; slots.len()];
        for (ix, task) in pending {
            let chunk = match task.await {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(unit = slots[ix].name(), error = %e, "unit poll task failed");
                    self.builder.error_chunk(slots[ix].name())
                }
            };
            self.cache[ix] = CacheEntry {
                chunk: Some(chunk.clone()),
                refreshed_at: Some(now),
            };
            out[ix] = Some(chunk);
        }

        for (ix, slot) in slots.iter().enumerate() {
            if out[ix].is_some() {
                continue;
            }
            let Some(cached) = self.cache[ix].chunk.clone() else {
                // Unreachable: units without a cached chunk are always due.
                continue;
            };
            let mut unit = slot.lock().await;
            let patch = unit.overrides().take_transient();
            drop(unit);

            let chunk = if patch.is_empty() {
                cached
            } else {
                cached.with_patch(patch)
            };
            // The patched chunk stays cached so the override remains visible
            // until the unit's next real refresh, then disappears.
            self.cache[ix].chunk = Some(chunk.clone());
            out[ix] = Some(chunk);
        }

        out.into_iter().flatten().collect()
    }

    fn is_due(&self, ix: usize, slot: &UnitSlot, now: Instant) -> bool {
        let entry = &self.cache[ix];
        match (&entry.chunk, entry.refreshed_at, slot.interval()) {
            (None, _, _) | (_, None, _) => true,
            (Some(_), Some(_), None) => true,
            (Some(_), Some(at), Some(interval)) => now.duration_since(at) >= interval,
        }
    }
}
