use std::{f64::consts::TAU, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::mpsc,
    task::JoinHandle,
};

use crate::{
    clock::{Clock, ManualClock},
    session_controller::SessionCommand,
};

pub const DEMO_CENTER: (f64, f64) = (45.4642, 9.19);
/// About 500 m of latitude.
pub const DEMO_RADIUS_DEG: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    pub high_accuracy: bool,
    /// Oldest cached fix a source may hand out
    pub max_fix_age: Duration,
    /// How long to wait for the next fix before reporting a failure
    pub timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            max_fix_age: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Sending half given to fix and clock producers.
/// Every send returns false once the controller stopped listening.
#[derive(Debug, Clone)]
pub struct FeedSender {
    commands: mpsc::Sender<SessionCommand>,
}

impl FeedSender {
    pub(crate) fn new(commands: mpsc::Sender<SessionCommand>) -> Self {
        Self { commands }
    }

    pub async fn fix(&self, fix: Fix) -> bool {
        self.commands.send(SessionCommand::Fix(fix)).await.is_ok()
    }

    pub async fn fix_failed(&self, reason: impl Into<String>) -> bool {
        self.commands.send(SessionCommand::FixFailed(reason.into())).await.is_ok()
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> bool {
        self.commands.send(SessionCommand::Tick(now)).await.is_ok()
    }
}

/// A device that reports positions. Aborting the returned task unsubscribes.
pub trait LocationSource: Send + 'static {
    fn watch(&mut self, options: WatchOptions, feed: FeedSender) -> JoinHandle<()>;
}

/// Reads one fix per line: `lat,lon` or `lat lon`, optionally followed by epoch milliseconds.
/// Lines without a time are stamped with the clock.
pub struct LineLocationSource<R> {
    reader: Option<R>,
    clock: Arc<dyn Clock>,
}

impl<R: AsyncBufRead + Unpin + Send + 'static> LineLocationSource<R> {
    pub fn new(reader: R, clock: Arc<dyn Clock>) -> Self {
        Self {
            reader: Some(reader),
            clock,
        }
    }
}

impl<R: AsyncBufRead + Unpin + Send + 'static> LocationSource for LineLocationSource<R> {
    fn watch(&mut self, options: WatchOptions, feed: FeedSender) -> JoinHandle<()> {
        let reader = self.reader.take();
        let clock = self.clock.clone();

        tokio::spawn(async move {
            let Some(reader) = reader else {
                tracing::warn!("Location stream was already consumed by an earlier run");
                return;
            };

            let mut lines = reader.lines();
            loop {
                let line = match tokio::time::timeout(options.timeout, lines.next_line()).await {
                    Ok(Ok(Some(line))) => line,
                    Ok(Ok(None)) => break,
                    Ok(Err(err)) => {
                        tracing::error!("Failed to read location stream: {}", err);
                        break;
                    }
                    Err(_) => {
                        if !feed.fix_failed("Timed out waiting for a fix").await {
                            break;
                        }
                        continue;
                    }
                };

                if line.trim().is_empty() {
                    continue;
                }

                let sent = match parse_fix(&line, clock.now()) {
                    Some(fix) => feed.fix(fix).await,
                    None => feed.fix_failed(format!("Unreadable fix: {}", line.trim())).await,
                };
                if !sent {
                    break;
                }
            }

            tracing::debug!("Location stream ended");
        })
    }
}

pub fn parse_fix(line: &str, now: DateTime<Utc>) -> Option<Fix> {
    let mut fields = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|field| !field.is_empty());

    let latitude = fields.next()?.parse::<f64>().ok()?;
    let longitude = fields.next()?.parse::<f64>().ok()?;
    let timestamp = match fields.next() {
        Some(millis) => DateTime::from_timestamp_millis(millis.parse().ok()?)?,
        None => now,
    };

    let in_range = (-90. ..=90.).contains(&latitude) && (-180. ..=180.).contains(&longitude);
    if fields.next().is_some() || !in_range {
        return None;
    }

    Some(Fix {
        latitude,
        longitude,
        timestamp,
    })
}

/// Simulated run around a fixed center. Each fix moves the shared clock forward by
/// `simulated_step` and ticks it, so a whole run plays back in a fraction of real time.
pub struct DemoLocationSource {
    clock: ManualClock,
    interval: Duration,
    simulated_step: chrono::Duration,
}

impl DemoLocationSource {
    pub fn new(clock: ManualClock, interval: Duration, simulated_step: chrono::Duration) -> Self {
        Self {
            clock,
            interval,
            simulated_step,
        }
    }
}

impl LocationSource for DemoLocationSource {
    fn watch(&mut self, _options: WatchOptions, feed: FeedSender) -> JoinHandle<()> {
        let clock = self.clock.clone();
        let period = self.interval;
        let step = self.simulated_step;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            let mut angle: f64 = 0.;

            loop {
                interval.tick().await;

                let fix = Fix {
                    latitude: DEMO_CENTER.0 + DEMO_RADIUS_DEG * angle.cos(),
                    longitude: DEMO_CENTER.1 + DEMO_RADIUS_DEG * angle.sin(),
                    timestamp: clock.now(),
                };
                if !feed.fix(fix).await {
                    break;
                }

                let now = clock.advance(step);
                if !feed.tick(now).await {
                    break;
                }

                angle = (angle + 0.02 + rand::random::<f64>() * 0.01) % TAU;
            }
        })
    }
}
