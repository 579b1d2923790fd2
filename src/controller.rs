//! Top-level control loop.
//!
//! The controller owns the unit list and the controller-wide default style,
//! and drives the two concurrent loops of the process: the tick loop
//! (poll units, emit one line) and the click-reader loop. Both run inside
//! `run` as concurrently polled futures, so a blocked unit read never stalls
//! click delivery and a click mutation is visible to the very next merge.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::chunk::ChunkBuilder;
use crate::click::route_clicks;
use crate::emit::LineEmitter;
use crate::error::ConfigError;
use crate::schedule::Scheduler;
use crate::unit::{StyleMap, Unit, UnitSlot};

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Orchestrates units, scheduler, emitter and click router.
///
/// # Example
///
/// ```no_run
/// use barline::{ClockUnit, Controller, TextUnit};
///
/// # tokio_test::block_on(async {
/// let (controller, shutdown) = Controller::builder()
///     .unit(TextUnit::new("label", "barline"))
///     .unit(ClockUnit::new("%H:%M:%S"))
///     .default_style("separator", true)
///     .build()
///     .unwrap();
///
/// controller.run(tokio::io::stdin(), tokio::io::stdout()).await.unwrap();
/// # drop(shutdown);
/// # });
/// ```
#[derive(Debug)]
pub struct Controller {
    slots: Vec<UnitSlot>,
    scheduler: Scheduler,
    interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl Controller {
    /// Create a builder for configuring a controller.
    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    /// Run until shut down or until the output stream breaks.
    ///
    /// Emits the protocol header, then alternates between scheduled ticks,
    /// click-triggered refreshes, and click routing. The click router keeps
    /// being polled while a tick is in flight, so a slow unit read never
    /// stalls click dispatch. The only error surfaced here is an unwritable
    /// output stream; with the bar host gone there is nothing left to report
    /// to. After shutdown is observed no further line is written.
    pub async fn run<R, W>(self, input: R, output: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Controller {
            slots,
            mut scheduler,
            interval,
            mut shutdown_rx,
        } = self;

        let mut emitter = LineEmitter::new(output);
        emitter.write_header().await?;

        let refresh = Notify::new();
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let click_loop = route_clicks(input, &slots, &refresh);
        tokio::pin!(click_loop);
        let mut clicks_open = true;
        let mut shutdown_open = true;

        loop {
            // Wait for the next reason to emit.
            tokio::select! {
                biased;

                res = shutdown_rx.changed(), if shutdown_open => {
                    match res {
                        Ok(()) if *shutdown_rx.borrow() => {
                            info!("shutdown requested, stopping");
                            return Ok(());
                        }
                        Ok(()) => {}
                        // Handle dropped; shutdown can no longer be requested.
                        Err(_) => shutdown_open = false,
                    }
                    continue;
                }
                _ = &mut click_loop, if clicks_open => {
                    // Input stream closed; keep emitting on the tick cadence.
                    debug!("click loop finished");
                    clicks_open = false;
                    continue;
                }
                _ = refresh.notified() => {}
                _ = ticker.tick() => {}
            }

            // Drive the tick to completion while still polling the click
            // router, so a blocked unit read cannot stall click dispatch.
            let tick = async {
                let chunks = scheduler.poll_all(&slots).await;
                emitter.write_line(&chunks).await
            };
            tokio::pin!(tick);
            loop {
                tokio::select! {
                    biased;

                    res = shutdown_rx.changed(), if shutdown_open => {
                        match res {
                            Ok(()) if *shutdown_rx.borrow() => {
                                info!("shutdown requested, stopping");
                                return Ok(());
                            }
                            Ok(()) => {}
                            Err(_) => shutdown_open = false,
                        }
                    }
                    res = &mut tick => {
                        res?;
                        break;
                    }
                    _ = &mut click_loop, if clicks_open => {
                        debug!("click loop finished");
                        clicks_open = false;
                    }
                }
            }
        }
    }
}

/// Stops a running controller. The counterpart of `Controller::run`; hand it
/// to a signal handler.
#[derive(Debug)]
pub struct ShutdownHandle {
    stop_tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request shutdown. The controller exits before writing anything else.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

/// Builder for configuring a [`Controller`].
#[derive(Debug, Default)]
pub struct ControllerBuilder {
    slots: Vec<UnitSlot>,
    defaults: StyleMap,
    interval: Option<Duration>,
    padding: usize,
    read_timeout: Option<Duration>,
}

impl ControllerBuilder {
    /// Append a unit. Registration order is position order on the bar.
    pub fn unit(mut self, unit: impl Unit + 'static) -> Self {
        self.slots.push(UnitSlot::new(Box::new(unit)));
        self
    }

    /// Set one controller-wide default style key.
    ///
    /// Defaults are the lowest-precedence layer of the chunk merge; any
    /// unit override wins key by key.
    pub fn default_style(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.defaults.insert(key.into(), value.into());
        self
    }

    /// Replace the whole default style map.
    pub fn defaults(mut self, defaults: StyleMap) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set the tick interval. Defaults to 1 second.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Spaces added around each unit's text. Defaults to 0.
    pub fn padding(mut self, padding: usize) -> Self {
        self.padding = padding;
        self
    }

    /// Per-unit read timeout. Defaults to 5 seconds.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Build the controller and its shutdown handle.
    ///
    /// Fails if no units are registered or two units share a name, since
    /// names identify chunks for click routing.
    pub fn build(self) -> Result<(Controller, ShutdownHandle), ConfigError> {
        if self.slots.is_empty() {
            return Err(ConfigError::NoUnits);
        }
        let mut seen = HashSet::new();
        for slot in &self.slots {
            if !seen.insert(slot.name().to_string()) {
                return Err(ConfigError::DuplicateUnitName(slot.name().to_string()));
            }
        }

        let builder = ChunkBuilder::new(
            self.defaults,
            self.padding,
            self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT),
        );
        let scheduler = Scheduler::new(builder, self.slots.len());
        let (stop_tx, shutdown_rx) = watch::channel(false);

        Ok((
            Controller {
                slots: self.slots,
                scheduler,
                interval: self.interval.unwrap_or(DEFAULT_TICK),
                shutdown_rx,
            },
            ShutdownHandle { stop_tx },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unit::{Overrides, ReadResult, TextUnit};
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    struct Percent {
        overrides: Overrides,
    }

    #[async_trait]
    impl Unit for Percent {
        fn name(&self) -> &str {
            "pct"
        }
        async fn read(&mut self) -> Result<ReadResult> {
            let mut out = ReadResult::new();
            out.insert("pct".to_string(), json!(42));
            Ok(out)
        }
        fn format(&self, data: &ReadResult) -> Result<String> {
            Ok(format!("{}%", data["pct"].as_i64().unwrap_or(0)))
        }
        fn overrides(&mut self) -> &mut Overrides {
            &mut self.overrides
        }
    }

    fn percent() -> Percent {
        Percent {
            overrides: Overrides::default(),
        }
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = Controller::builder()
            .unit(TextUnit::new("same", "a"))
            .unit(TextUnit::new("same", "b"))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateUnitName(name) if name == "same"));
    }

    #[test]
    fn empty_controller_is_rejected() {
        let err = Controller::builder().build().unwrap_err();
        assert!(matches!(err, ConfigError::NoUnits));
    }

    #[tokio::test]
    async fn emits_header_then_ordered_ticks() {
        let (controller, shutdown) = Controller::builder()
            .unit(percent())
            .unit(TextUnit::new("label", "10:00"))
            .default_style("separator", true)
            .interval(Duration::from_millis(20))
            .build()
            .unwrap();

        let (_click_tx, click_rx) = tokio::io::duplex(256);
        let (out_tx, out_rx) = tokio::io::duplex(4096);
        let task = tokio::spawn(controller.run(click_rx, out_tx));

        let mut lines = BufReader::new(out_rx).lines();
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            r#"{"version":1,"click_events":true}"#
        );
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "[");

        let first = lines.next_line().await.unwrap().unwrap();
        assert_eq!(
            first,
            r#"[{"full_text":"42%","name":"pct","separator":true},{"full_text":"10:00","name":"label","separator":true}]"#
        );

        let second = lines.next_line().await.unwrap().unwrap();
        assert!(second.starts_with(','), "streaming comma prefix: {second}");

        shutdown.stop();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn click_triggers_prompt_refresh_with_transient() {
        let (controller, shutdown) = Controller::builder()
            .unit(TextUnit::new("label", "hi"))
            // Long tick: any prompt refresh must come from the click path.
            .interval(Duration::from_secs(60))
            .build()
            .unwrap();

        let (mut click_tx, click_rx) = tokio::io::duplex(256);
        let (out_tx, out_rx) = tokio::io::duplex(4096);
        let task = tokio::spawn(controller.run(click_rx, out_tx));

        let mut lines = BufReader::new(out_rx).lines();
        let _header = lines.next_line().await.unwrap();
        let _open = lines.next_line().await.unwrap();
        let first = lines.next_line().await.unwrap().unwrap();
        assert!(!first.contains("urgent"));

        click_tx.write_all(b"[\n").await.unwrap();
        click_tx
            .write_all(b"{\"name\":\"label\",\"button\":1,\"x\":0,\"y\":0}\n")
            .await
            .unwrap();

        let refreshed = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .expect("refresh line before the next scheduled tick")
            .unwrap()
            .unwrap();
        assert!(refreshed.contains(r#""urgent":true"#), "line: {refreshed}");

        shutdown.stop();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn no_output_after_shutdown() {
        let (controller, shutdown) = Controller::builder()
            .unit(TextUnit::new("label", "hi"))
            .interval(Duration::from_millis(10))
            .build()
            .unwrap();

        let (_click_tx, click_rx) = tokio::io::duplex(256);
        let (out_tx, out_rx) = tokio::io::duplex(4096);
        let task = tokio::spawn(controller.run(click_rx, out_tx));

        let mut lines = BufReader::new(out_rx).lines();
        let _ = lines.next_line().await.unwrap();
        let _ = lines.next_line().await.unwrap();
        let _ = lines.next_line().await.unwrap();

        shutdown.stop();
        task.await.unwrap().unwrap();

        // The writer is dropped once run returns; the stream ends rather
        // than producing another line.
        loop {
            match lines.next_line().await.unwrap() {
                Some(line) => assert!(line.starts_with(','), "only queued lines: {line}"),
                None => break,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_read_does_not_stall_click_dispatch() {
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
        use std::sync::Arc;

        struct SlowUnit {
            reading: Arc<AtomicBool>,
            overrides: Overrides,
        }

        #[async_trait]
        impl Unit for SlowUnit {
            fn name(&self) -> &str {
                "slow"
            }
            async fn read(&mut self) -> Result<ReadResult> {
                self.reading.store(true, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(ReadResult::new())
            }
            fn format(&self, _data: &ReadResult) -> Result<String> {
                Ok("slow".to_string())
            }
            fn overrides(&mut self) -> &mut Overrides {
                &mut self.overrides
            }
        }

        struct ClickCounter {
            clicks: Arc<AtomicUsize>,
            overrides: Overrides,
        }

        #[async_trait]
        impl Unit for ClickCounter {
            fn name(&self) -> &str {
                "btn"
            }
            async fn read(&mut self) -> Result<ReadResult> {
                Ok(ReadResult::new())
            }
            fn format(&self, _data: &ReadResult) -> Result<String> {
                Ok("btn".to_string())
            }
            fn handle_click(&mut self, _event: &crate::click::ClickEvent) -> Result<()> {
                self.clicks.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            fn overrides(&mut self) -> &mut Overrides {
                &mut self.overrides
            }
        }

        let reading = Arc::new(AtomicBool::new(false));
        let clicks = Arc::new(AtomicUsize::new(0));
        let (controller, shutdown) = Controller::builder()
            .unit(SlowUnit {
                reading: reading.clone(),
                overrides: Overrides::default(),
            })
            .unit(ClickCounter {
                clicks: clicks.clone(),
                overrides: Overrides::default(),
            })
            .interval(Duration::from_secs(1))
            // Generous timeout: the read must still be pending when the
            // click arrives.
            .read_timeout(Duration::from_secs(300))
            .build()
            .unwrap();

        let (mut click_tx, click_rx) = tokio::io::duplex(256);
        let (out_tx, out_rx) = tokio::io::duplex(4096);
        let task = tokio::spawn(controller.run(click_rx, out_tx));

        let mut lines = BufReader::new(out_rx).lines();
        let _header = lines.next_line().await.unwrap();
        let _open = lines.next_line().await.unwrap();

        // Make sure the slow read is actually in flight before clicking.
        tokio::time::timeout(Duration::from_secs(5), async {
            while !reading.load(Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("slow read in flight");

        click_tx
            .write_all(b"{\"name\":\"btn\",\"button\":1}\n")
            .await
            .unwrap();

        // The handler must run while the 60s read is still pending, not
        // after the tick completes.
        tokio::time::timeout(Duration::from_secs(5), async {
            while clicks.load(Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("click delivered during the slow read");

        shutdown.stop();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_click_stream_keeps_ticking() {
        let (controller, shutdown) = Controller::builder()
            .unit(TextUnit::new("label", "hi"))
            .interval(Duration::from_millis(10))
            .build()
            .unwrap();

        let (click_tx, click_rx) = tokio::io::duplex(256);
        drop(click_tx); // input closes immediately
        let (out_tx, out_rx) = tokio::io::duplex(4096);
        let task = tokio::spawn(controller.run(click_rx, out_tx));

        let mut lines = BufReader::new(out_rx).lines();
        let _ = lines.next_line().await.unwrap();
        let _ = lines.next_line().await.unwrap();
        assert!(lines.next_line().await.unwrap().is_some());
        assert!(lines.next_line().await.unwrap().is_some());

        shutdown.stop();
        task.await.unwrap().unwrap();
    }
}
