//! Error types for the status line core.

use std::time::Duration;

use thiserror::Error;

/// Failures raised at the unit boundary.
///
/// All of these are contained per unit: the affected unit's chunk is
/// degraded for the current tick and the rest of the line is unaffected.
#[derive(Debug, Error)]
pub enum UnitError {
    /// The unit's `read` returned an error.
    #[error("read failed: {0}")]
    Read(anyhow::Error),

    /// The unit's `read` did not complete within the configured timeout.
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The unit's `format` returned an error on a valid read result.
    #[error("format failed: {0}")]
    Format(anyhow::Error),
}

/// Errors detected while assembling a controller.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two units were registered under the same name.
    ///
    /// Names identify chunks on the wire and route click events, so they
    /// must be unique within one controller.
    #[error("duplicate unit name: {0}")]
    DuplicateUnitName(String),

    /// No units were registered.
    #[error("no units registered")]
    NoUnits,
}
