//! Unit abstraction for status line segments.
//!
//! This module provides the trait-based abstraction for the independent data
//! sources that make up a status line (clock, battery, network, ...). Each
//! unit knows how to read its raw data, format it for display, and react to
//! click events; the scheduler and click router drive units through this
//! interface without interpreting their data.

mod clock;
mod text;

pub use clock::ClockUnit;
pub use text::TextUnit;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, MutexGuard};

use crate::click::ClickEvent;

/// Raw output of a unit's `read`.
///
/// Opaque to the core: it is a contract between a unit's own `read` and
/// `format`, and is passed between them unmodified.
pub type ReadResult = serde_json::Map<String, Value>;

/// A set of bar style keys (`color`, `separator`, `min_width`, ...).
///
/// Values are passthrough JSON; the core merges by key and never interprets
/// them.
pub type StyleMap = BTreeMap<String, Value>;

/// Per-unit style patches layered over the controller defaults.
///
/// `permanent` persists across ticks until the unit mutates it; `transient`
/// is a one-shot signal, consumed and cleared by the merge that emits it.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub permanent: StyleMap,
    pub transient: StyleMap,
}

impl Overrides {
    /// Set a style key that persists across ticks.
    pub fn set_permanent(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.permanent.insert(key.into(), value.into());
    }

    /// Set a style key for the next emitted chunk only.
    pub fn set_transient(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.transient.insert(key.into(), value.into());
    }

    /// Take the pending transient patch, leaving it empty.
    pub fn take_transient(&mut self) -> StyleMap {
        std::mem::take(&mut self.transient)
    }
}

/// Trait for all status line units.
///
/// A unit is a self-contained status source. The core calls `read` and
/// `format` on a cadence and `handle_click` when the bar reports a click on
/// the unit's chunk. Any of the three may fail; failures are contained at
/// this boundary and never abort the rest of the line.
///
/// # Example
///
/// ```
/// use anyhow::Result;
/// use async_trait::async_trait;
/// use barline::{Overrides, ReadResult, Unit};
///
/// struct Uptime {
///     overrides: Overrides,
/// }
///
/// #[async_trait]
/// impl Unit for Uptime {
///     fn name(&self) -> &str {
///         "uptime"
///     }
///
///     async fn read(&mut self) -> Result<ReadResult> {
///         let mut out = ReadResult::new();
///         out.insert("days".into(), 3.into());
///         Ok(out)
///     }
///
///     fn format(&self, data: &ReadResult) -> Result<String> {
///         let days = data.get("days").and_then(|v| v.as_i64()).unwrap_or(0);
///         Ok(format!("up {}d", days))
///     }
///
///     fn overrides(&mut self) -> &mut Overrides {
///         &mut self.overrides
///     }
/// }
/// ```
#[async_trait]
pub trait Unit: Send {
    /// The unit's name, used as the chunk `name` on the wire and to route
    /// click events back to this unit. Unique within one controller.
    fn name(&self) -> &str;

    /// How often this unit wants to be re-read.
    ///
    /// `None` means every tick. A longer interval makes the scheduler reuse
    /// the unit's previous chunk on ticks where it is not due.
    fn poll_interval(&self) -> Option<Duration> {
        None
    }

    /// Gather the unit's raw data. May block on external I/O; the scheduler
    /// bounds each invocation with a timeout.
    async fn read(&mut self) -> Result<ReadResult>;

    /// Format a read result into the chunk's display text.
    fn format(&self, data: &ReadResult) -> Result<String>;

    /// React to a click on this unit's chunk. Typical implementations mutate
    /// internal state or the override maps to change the next tick's output.
    fn handle_click(&mut self, _event: &ClickEvent) -> Result<()> {
        Ok(())
    }

    /// The unit's style override maps.
    fn overrides(&mut self) -> &mut Overrides;
}

/// Type-erased unit for dynamic dispatch.
pub type BoxedUnit = Box<dyn Unit>;

/// A registered unit plus the identity the core needs without locking it.
///
/// The unit itself lives behind an async mutex so the per-tick poll task and
/// the click router can each touch it without touching any other unit.
#[derive(Debug)]
pub struct UnitSlot {
    name: String,
    interval: Option<Duration>,
    unit: Arc<Mutex<BoxedUnit>>,
}

impl UnitSlot {
    pub fn new(unit: BoxedUnit) -> Self {
        let name = unit.name().to_string();
        let interval = unit.poll_interval();
        Self {
            name,
            interval,
            unit: Arc::new(Mutex::new(unit)),
        }
    }

    /// The unit's name, captured at registration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The unit's declared poll interval, captured at registration.
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Clone the shared handle, for moving into a per-tick poll task.
    pub(crate) fn handle(&self) -> Arc<Mutex<BoxedUnit>> {
        Arc::clone(&self.unit)
    }

    /// Lock the unit in place.
    pub async fn lock(&self) -> MutexGuard<'_, BoxedUnit> {
        self.unit.lock().await
    }
}

impl std::fmt::Debug for dyn Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unit").field("name", &self.name()).finish()
    }
}
