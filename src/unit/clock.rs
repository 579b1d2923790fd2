//! Wall clock unit.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use serde_json::json;

use super::{Overrides, ReadResult, Unit};
use crate::click::ClickEvent;

/// A unit showing the local wall clock time.
///
/// Left-clicking the chunk toggles to the alternate format (by default a
/// full date) until the next left click.
///
/// # Example
///
/// ```
/// use barline::ClockUnit;
///
/// let clock = ClockUnit::new("%H:%M:%S").with_alt_format("%a %Y-%m-%d %H:%M");
/// ```
#[derive(Debug)]
pub struct ClockUnit {
    name: String,
    format: String,
    alt_format: String,
    show_alt: bool,
    overrides: Overrides,
}

impl ClockUnit {
    /// Create a clock with the given `chrono` strftime format.
    pub fn new(format: &str) -> Self {
        Self {
            name: "clock".to_string(),
            format: format.to_string(),
            alt_format: "%a %Y-%m-%d %H:%M:%S".to_string(),
            show_alt: false,
            overrides: Overrides::default(),
        }
    }

    /// Override the unit name (needed when running several clocks).
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Set the format shown while toggled by a click.
    pub fn with_alt_format(mut self, format: &str) -> Self {
        self.alt_format = format.to_string();
        self
    }

    fn active_format(&self) -> &str {
        if self.show_alt {
            &self.alt_format
        } else {
            &self.format
        }
    }
}

#[async_trait]
impl Unit for ClockUnit {
    fn name(&self) -> &str {
        &self.name
    }

    fn poll_interval(&self) -> Option<Duration> {
        Some(Duration::from_secs(1))
    }

    async fn read(&mut self) -> Result<ReadResult> {
        let now = Local::now();
        let mut out = ReadResult::new();
        out.insert(
            "time".to_string(),
            json!(now.format(self.active_format()).to_string()),
        );
        Ok(out)
    }

    fn format(&self, data: &ReadResult) -> Result<String> {
        let time = data
            .get("time")
            .and_then(|v| v.as_str())
            .context("missing 'time' field")?;
        Ok(time.to_string())
    }

    fn handle_click(&mut self, event: &ClickEvent) -> Result<()> {
        if event.button == Some(1) {
            self.show_alt = !self.show_alt;
        }
        Ok(())
    }

    fn overrides(&mut self) -> &mut Overrides {
        &mut self.overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn left_click() -> ClickEvent {
        ClickEvent {
            name: Some("clock".to_string()),
            button: Some(1),
            ..ClickEvent::default()
        }
    }

    #[tokio::test]
    async fn read_produces_time_field() {
        let mut clock = ClockUnit::new("%H:%M");
        let data = clock.read().await.unwrap();
        let time = data.get("time").and_then(|v| v.as_str()).unwrap();
        // HH:MM
        assert_eq!(time.len(), 5);
        assert_eq!(&time[2..3], ":");
    }

    #[tokio::test]
    async fn format_passes_time_through() {
        let clock = ClockUnit::new("%H:%M");
        let mut data = ReadResult::new();
        data.insert("time".to_string(), json!("10:00"));
        assert_eq!(clock.format(&data).unwrap(), "10:00");
    }

    #[test]
    fn format_fails_without_time_field() {
        let clock = ClockUnit::new("%H:%M");
        assert!(clock.format(&ReadResult::new()).is_err());
    }

    #[tokio::test]
    async fn left_click_toggles_alt_format() {
        let mut clock = ClockUnit::new("%H:%M").with_alt_format("%Y");
        clock.handle_click(&left_click()).unwrap();

        let data = clock.read().await.unwrap();
        let time = data.get("time").and_then(|v| v.as_str()).unwrap();
        assert_eq!(time.len(), 4, "alt format is the bare year");

        clock.handle_click(&left_click()).unwrap();
        let data = clock.read().await.unwrap();
        let time = data.get("time").and_then(|v| v.as_str()).unwrap();
        assert_eq!(time.len(), 5);
    }

    #[test]
    fn other_buttons_are_ignored() {
        let mut clock = ClockUnit::new("%H:%M");
        let event = ClickEvent {
            button: Some(3),
            ..ClickEvent::default()
        };
        clock.handle_click(&event).unwrap();
        assert!(!clock.show_alt);
    }
}
