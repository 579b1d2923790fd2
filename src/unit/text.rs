//! Static text unit.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;

use super::{Overrides, ReadResult, Unit};
use crate::click::ClickEvent;

/// A unit showing a fixed piece of text.
///
/// Mostly useful as a label or separator. Clicking the chunk marks it urgent
/// for one tick, which doubles as a quick end-to-end check that click routing
/// works on a freshly configured bar.
#[derive(Debug)]
pub struct TextUnit {
    name: String,
    text: String,
    overrides: Overrides,
}

impl TextUnit {
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
            overrides: Overrides::default(),
        }
    }
}

#[async_trait]
impl Unit for TextUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_interval(&self) -> Option<Duration> {
        // The text never changes; refresh rarely and let the scheduler reuse
        // the cached chunk in between.
        Some(Duration::from_secs(3600))
    }

    async fn read(&mut self) -> Result<ReadResult> {
        let mut out = ReadResult::new();
        out.insert("text".to_string(), json!(self.text));
        Ok(out)
    }

    fn format(&self, data: &ReadResult) -> Result<String> {
        let text = data
            .get("text")
            .and_then(|v| v.as_str())
            .context("missing 'text' field")?;
        Ok(text.to_string())
    }

    fn handle_click(&mut self, _event: &ClickEvent) -> Result<()> {
        self.overrides.set_transient("urgent", true);
        Ok(())
    }

    fn overrides(&mut self) -> &mut Overrides {
        &mut self.overrides
    }
}
