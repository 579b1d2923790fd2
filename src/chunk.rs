//! Chunk assembly and the style override merge.
//!
//! A chunk is one renderable segment of the status line, corresponding to
//! one unit's current output. The builder here turns a unit's read/format
//! output plus three layers of style keys into the JSON object the bar
//! expects, containing every failure at the unit boundary.

use std::time::Duration;

use serde_json::{json, Map, Value};
use tokio::time::timeout;
use tracing::warn;

use crate::error::UnitError;
use crate::unit::{BoxedUnit, ReadResult, StyleMap};

/// One bar-protocol chunk: `full_text` plus passthrough style keys.
///
/// The merged key set is kept as a single JSON object because the bar treats
/// it that way; `full_text` is guaranteed present by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    map: Map<String, Value>,
    degraded: bool,
}

impl Chunk {
    /// The display text, if still a string after overrides.
    pub fn full_text(&self) -> Option<&str> {
        self.map.get("full_text").and_then(|v| v.as_str())
    }

    /// Look up a merged style key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    /// Whether this chunk was produced through a failure fallback.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Serialize for the wire.
    ///
    /// A chunk that fails to serialize degrades to its `full_text` alone so
    /// one broken style value cannot take down the whole line. With the
    /// current value model this cannot happen (`serde_json::Value` holds no
    /// non-finite numbers); the fallback only matters if richer style value
    /// types ever land in the map.
    pub fn to_wire(&self) -> String {
        match serde_json::to_string(&self.map) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "chunk failed to serialize, emitting full_text only");
                json!({ "full_text": self.full_text().unwrap_or("") }).to_string()
            }
        }
    }

    /// Overlay a one-shot style patch, key by key.
    ///
    /// Used by the scheduler to fold a pending transient override into a
    /// cached chunk between refreshes of a slow-cadence unit.
    pub(crate) fn with_patch(&self, patch: StyleMap) -> Chunk {
        let mut map = self.map.clone();
        for (k, v) in patch {
            map.insert(k, v);
        }
        Chunk {
            map,
            degraded: self.degraded,
        }
    }
}

/// Builds one chunk per unit per tick, applying the override merge.
///
/// Merge precedence, later layers winning key by key:
/// controller defaults, then the injected unit `name`, then the unit's
/// permanent overrides, then its transient overrides. The transient map is
/// taken and cleared by the same merge that applies it.
#[derive(Debug)]
pub struct ChunkBuilder {
    defaults: StyleMap,
    padding: usize,
    read_timeout: Duration,
}

impl ChunkBuilder {
    pub fn new(defaults: StyleMap, padding: usize, read_timeout: Duration) -> Self {
        Self {
            defaults,
            padding,
            read_timeout,
        }
    }

    /// Run one unit's read/format and merge its chunk.
    ///
    /// Never fails: a read error or timeout substitutes an `{"error": ...}`
    /// read result (still handed to `format`, so units that understand the
    /// key can render it), and a format error substitutes fallback text.
    /// Either path marks the chunk degraded for this tick only.
    pub async fn build(&self, unit: &mut BoxedUnit) -> Chunk {
        let name = unit.name().to_string();

        let mut degraded = false;
        let data = match timeout(self.read_timeout, unit.read()).await {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                degraded = true;
                let err = UnitError::Read(e);
                warn!(unit = %name, error = %err, "unit read failed");
                error_payload(&err)
            }
            Err(_) => {
                degraded = true;
                let err = UnitError::ReadTimeout(self.read_timeout);
                warn!(unit = %name, error = %err, "unit read timed out");
                error_payload(&err)
            }
        };

        let mut format_failed = false;
        let text = match unit.format(&data) {
            Ok(text) => text,
            Err(e) => {
                degraded = true;
                format_failed = true;
                let err = UnitError::Format(e);
                warn!(unit = %name, error = %err, "unit format failed");
                fallback_text(&name)
            }
        };

        let overrides = unit.overrides();
        let permanent = overrides.permanent.clone();
        // One-shot: cleared by this merge even when format failed and the
        // patch is not applied.
        let transient = overrides.take_transient();
        let transient = if format_failed {
            StyleMap::new()
        } else {
            transient
        };

        self.assemble(&name, text, &permanent, transient, degraded)
    }

    /// A degraded chunk for a unit whose poll task could not produce one
    /// (e.g. the task panicked). Only defaults and the name are merged.
    pub fn error_chunk(&self, name: &str) -> Chunk {
        self.assemble(name, fallback_text(name), &StyleMap::new(), StyleMap::new(), true)
    }

    fn assemble(
        &self,
        name: &str,
        text: String,
        permanent: &StyleMap,
        transient: StyleMap,
        degraded: bool,
    ) -> Chunk {
        let mut map = Map::new();
        map.insert("full_text".to_string(), json!(text));
        for (k, v) in &self.defaults {
            map.insert(k.clone(), v.clone());
        }
        map.insert("name".to_string(), json!(name));
        for (k, v) in permanent {
            map.insert(k.clone(), v.clone());
        }
        for (k, v) in transient {
            map.insert(k, v);
        }

        if self.padding > 0 {
            if let Some(Value::String(s)) = map.get_mut("full_text") {
                let pad = " ".repeat(self.padding);
                *s = format!("{pad}{s}{pad}");
            }
        }

        Chunk { map, degraded }
    }
}

fn fallback_text(name: &str) -> String {
    format!("{name} [failed]")
}

fn error_payload(err: &UnitError) -> ReadResult {
    let mut out = ReadResult::new();
    out.insert("error".to_string(), json!(err.to_string()));
    out
}
