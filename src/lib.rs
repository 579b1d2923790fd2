//! # barline
//!
//! A status line generator speaking the i3bar/swaybar JSON protocol.
//!
//! barline polls a set of independent "units" (clock, battery, network, ...),
//! formats each into one chunk of the status line, and emits one JSON array
//! per refresh tick on stdout, while routing click events from stdin back to
//! the unit that was clicked.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                        Controller                          │
//! │  ┌──────────┐    ┌─────────┐    ┌──────────┐   ┌────────┐  │
//! │  │ schedule │───▶│  chunk  │───▶│   emit   │──▶│ stdout │  │
//! │  │ (ticks)  │    │ (merge) │    │ (wire)   │   └────────┘  │
//! │  └────┬─────┘    └─────────┘    └──────────┘               │
//! │       │ read/format    ▲ overrides                         │
//! │       ▼                │                                   │
//! │  ┌──────────┐    ┌─────┴────┐                 ┌────────┐   │
//! │  │   unit   │◀───│  click   │◀────────────────│ stdin  │   │
//! │  │ (trait)  │    │ (router) │                 └────────┘   │
//! │  └──────────┘    └──────────┘                              │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`unit`]**: the [`Unit`] trait every status source implements, plus
//!   the bundled [`ClockUnit`] and [`TextUnit`]
//! - **[`chunk`]**: merges controller defaults with a unit's permanent and
//!   transient style overrides into one bar-protocol chunk
//! - **[`schedule`]**: polls units concurrently each tick, isolating
//!   per-unit failures and honoring per-unit poll intervals
//! - **[`emit`]**: the streamed-JSON-array wire format
//! - **[`click`]**: decodes click events and dispatches them to units
//! - **[`controller`]**: wires it all together with clean shutdown
//!
//! ## Usage
//!
//! ```no_run
//! use barline::{ClockUnit, Controller, TextUnit};
//!
//! # tokio_test::block_on(async {
//! let (controller, shutdown) = Controller::builder()
//!     .unit(TextUnit::new("label", "barline"))
//!     .unit(ClockUnit::new("%H:%M:%S"))
//!     .default_style("separator", true)
//!     .build()
//!     .unwrap();
//!
//! controller.run(tokio::io::stdin(), tokio::io::stdout()).await.unwrap();
//! # drop(shutdown);
//! # });
//! ```

pub mod chunk;
pub mod click;
pub mod controller;
pub mod duration;
pub mod emit;
pub mod error;
pub mod schedule;
pub mod unit;

// Re-export main types for convenience
pub use chunk::{Chunk, ChunkBuilder};
pub use click::{route_clicks, ClickEvent};
pub use controller::{Controller, ControllerBuilder, ShutdownHandle};
pub use emit::{LineEmitter, PROTOCOL_HEADER};
pub use error::{ConfigError, UnitError};
pub use schedule::Scheduler;
pub use unit::{BoxedUnit, ClockUnit, Overrides, ReadResult, StyleMap, TextUnit, Unit, UnitSlot};
