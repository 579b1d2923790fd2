//! Click event decoding and routing.
//!
//! The bar host reports clicks on stdin as an infinite JSON array of event
//! objects, one per line, with the same comma-prefix framing the output
//! stream uses. The router strips the framing, decodes each event, and
//! dispatches it to the unit whose chunk was clicked.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::unit::UnitSlot;

/// A click event as reported by the bar host.
///
/// `name` identifies the clicked chunk (it is injected into every chunk by
/// the builder). Fields this crate does not know about are preserved in
/// `extra` and delivered to the unit verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClickEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub button: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Read click events from `input` until it closes, dispatching each to the
/// unit named in the event.
///
/// Unknown names and undecodable lines are dropped. A failing click handler
/// is logged and swallowed; it never stops the loop. After a successfully
/// handled click `refresh` is notified so the controller can emit feedback
/// before the next scheduled tick.
pub async fn route_clicks<R>(input: R, slots: &[UnitSlot], refresh: &Notify)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(input);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("click stream closed");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "failed to read click stream");
                return;
            }
        }

        // Strip the streaming-array framing: a lone "[", and leading or
        // trailing commas around each event object.
        let raw = line
            .trim()
            .trim_start_matches(['[', ','])
            .trim_end_matches(',')
            .trim();
        if raw.is_empty() {
            continue;
        }

        let event: ClickEvent = match serde_json::from_str(raw) {
            Ok(event) => event,
            Err(e) => {
                debug!(error = %e, line = raw, "dropping undecodable click event");
                continue;
            }
        };

        let Some(name) = event.name.as_deref() else {
            debug!("dropping click event without a name");
            continue;
        };
        let Some(slot) = slots.iter().find(|s| s.name() == name) else {
            debug!(unit = name, "dropping click for unknown unit");
            continue;
        };

        let mut unit = slot.lock().await;
        match unit.handle_click(&event) {
            Ok(()) => {
                drop(unit);
                refresh.notify_one();
            }
            Err(e) => {
                warn!(unit = name, error = %e, "click handler failed");
            }
        }
    }
}
