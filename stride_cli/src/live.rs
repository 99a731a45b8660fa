use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::Utc;
use stride_tracker_data_management::{
    clock::{Clock, ManualClock, SystemClock},
    location::{DemoLocationSource, LineLocationSource, LocationSource},
    log_store::JsonFileLogStore,
    notify::{Notifications, TracingSink, COMPLETED_VIBRATION, DEFAULT_VIBRATION},
    preferences::Preferences,
    session_controller::{SessionController, SessionHandle},
    LogBook,
};
use stride_tracker_lib::{
    intervals::{IntervalEvent, IntervalPlan, IntervalTimer},
    log_entry::LogEntry,
    pace::{format_duration, format_pace},
    run_session::SessionSnapshot,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    task::JoinHandle,
};

/// Simulated run time per demo fix.
const DEMO_STEP_SECONDS: i64 = 5;

const CONTROLS_HELP: &str = "Type p to pause or resume, away to leave the app, s to stop";

type Book = LogBook<JsonFileLogStore>;

/// What the runner can do from the keyboard while a run is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    TogglePause,
    /// Stands in for the app losing focus; pauses when autopause is on.
    FocusLost,
    Stop,
}

fn parse_control(line: &str) -> Option<Control> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" | "pause" | "resume" => Some(Control::TogglePause),
        "a" | "away" => Some(Control::FocusLost),
        "s" | "stop" => Some(Control::Stop),
        _ => None,
    }
}

/// Controls typed on stdin, one per line.
fn stdin_controls() -> mpsc::Receiver<Control> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match parse_control(&line) {
                Some(control) => {
                    if tx.send(control).await.is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => tracing::warn!("Unknown control {:?}. {}", line.trim(), CONTROLS_HELP),
            }
        }
    });
    rx
}

fn controller(
    book: Book,
    preferences: Preferences,
    clock: Arc<dyn Clock>,
) -> SessionController<JsonFileLogStore> {
    let notifications = Notifications::new(preferences, Box::new(TracingSink));
    SessionController::new(book, notifications, clock)
}

/// Fixes come from `input` or, without one, from stdin. Keyboard controls are only read
/// when stdin is not carrying fixes.
pub async fn record(
    book: Book,
    preferences: Preferences,
    input: Option<PathBuf>,
    save: bool,
) -> anyhow::Result<Option<LogEntry>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (source, controls) = match input {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Cannot read {:?}", path))?;
            let source: Box<dyn LocationSource> =
                Box::new(LineLocationSource::new(BufReader::new(file), clock.clone()));
            (source, stdin_controls())
        }
        None => {
            let stdin = BufReader::new(tokio::io::stdin());
            let source: Box<dyn LocationSource> =
                Box::new(LineLocationSource::new(stdin, clock.clone()));
            (source, mpsc::channel(1).1)
        }
    };

    let (handle, task) = controller(book, preferences, clock).with_location(source).spawn();
    handle.start().await?;
    tracing::info!("Recording, press Ctrl-C to stop");

    follow(&handle, None, controls).await?;
    finish(handle, task, save).await
}

pub async fn demo(
    book: Book,
    preferences: Preferences,
    minutes: u64,
    interval_ms: u64,
) -> anyhow::Result<Option<LogEntry>> {
    let clock = ManualClock::new(Utc::now());
    let source = DemoLocationSource::new(
        clock.clone(),
        Duration::from_millis(interval_ms),
        chrono::Duration::seconds(DEMO_STEP_SECONDS),
    );

    let (handle, task) = controller(book, preferences, Arc::new(clock))
        .with_location(Box::new(source))
        .spawn();
    handle.start().await?;
    tracing::info!("Demo run started, {} minutes. {}", minutes, CONTROLS_HELP);

    follow(&handle, Some(minutes * 60), stdin_controls()).await?;
    finish(handle, task, true).await
}

/// Plays the track through the controller so it is saved like a recorded run.
pub async fn import_gpx(
    book: Book,
    preferences: Preferences,
    text: String,
) -> anyhow::Result<LogEntry> {
    let (handle, task) = controller(book, preferences, Arc::new(SystemClock)).spawn();
    let imported = handle.import_gpx(text).await;
    handle.shutdown().await?;
    task.await?;
    Ok(imported?)
}

/// Prints every published state and forwards controls. Returns on Ctrl-C, a stop control,
/// or once the run reaches `until_seconds`.
async fn follow(
    handle: &SessionHandle,
    until_seconds: Option<u64>,
    mut controls: mpsc::Receiver<Control>,
) -> anyhow::Result<()> {
    let mut snapshots = handle.subscribe();
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                return Ok(());
            }
            Some(control) = controls.recv() => match control {
                Control::TogglePause => handle.toggle_pause().await?,
                Control::FocusLost => handle.focus_lost().await?,
                Control::Stop => return Ok(()),
            },
            changed = snapshots.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let elapsed = match snapshots.borrow_and_update().as_ref() {
                    Some(snapshot) => {
                        println!("{}", status_line(snapshot));
                        snapshot.elapsed_seconds
                    }
                    None => continue,
                };
                if until_seconds.is_some_and(|until| elapsed >= until) {
                    return Ok(());
                }
            }
        }
    }
}

async fn finish(
    handle: SessionHandle,
    task: JoinHandle<()>,
    save: bool,
) -> anyhow::Result<Option<LogEntry>> {
    let entry = handle.stop(save).await?;
    handle.shutdown().await?;
    task.await?;
    Ok(entry)
}

fn status_line(snapshot: &SessionSnapshot) -> String {
    format!(
        "{}  {:.2} km  {}  splits {}{}",
        format_duration(snapshot.elapsed_seconds),
        snapshot.distance_meters / 1000.,
        format_pace(snapshot.pace),
        snapshot.splits.len(),
        if snapshot.paused { "  (paused)" } else { "" }
    )
}

pub async fn intervals(
    preferences: Preferences,
    warmup: u64,
    work: u64,
    rest: u64,
    reps: u32,
    cooldown: u64,
) -> anyhow::Result<()> {
    let mut notifications = Notifications::new(preferences, Box::new(TracingSink));
    let plan = IntervalPlan::new(warmup, work, rest, reps, cooldown);
    tracing::info!("Interval workout, {} total", format_duration(plan.total_seconds()));

    let (mut timer, events) = IntervalTimer::start(plan);
    announce(&mut notifications, events);

    let mut ticks = tokio::time::interval(Duration::from_secs(1));
    ticks.tick().await;
    while !timer.is_finished() {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                timer.stop();
                tracing::info!("Interval workout stopped");
            }
            _ = ticks.tick() => {
                let events = timer.tick();
                if let Some((label, left)) = timer.current() {
                    println!("{}  {}", label, format_duration(left));
                }
                announce(&mut notifications, events);
            }
        }
    }
    Ok(())
}

fn announce(notifications: &mut Notifications, events: Vec<IntervalEvent>) {
    for event in events {
        match event {
            IntervalEvent::PhaseStarted { label, seconds } => {
                println!("{} for {}", label, format_duration(seconds));
                notifications.speak(&label);
            }
            IntervalEvent::Switch => {
                notifications.vibrate(&DEFAULT_VIBRATION);
                notifications.speak("Switch");
            }
            IntervalEvent::Completed => {
                notifications.speak("Intervals completed");
                notifications.vibrate(&COMPLETED_VIBRATION);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stride_tracker_data_management::log_store::MemoryLogStore;

    fn live_handle(autopause: bool) -> SessionHandle {
        let clock = ManualClock::new(Utc::now());
        let empty: &'static [u8] = b"";
        let source = LineLocationSource::new(empty, Arc::new(clock.clone()));
        let preferences = Preferences { autopause, ..Preferences::default() };

        let (handle, _task) = SessionController::new(
            LogBook::new(MemoryLogStore::new()),
            Notifications::new(preferences, Box::new(TracingSink)),
            Arc::new(clock),
        )
        .with_location(Box::new(source))
        .spawn();
        handle
    }

    async fn run_controls(handle: &SessionHandle, sequence: &[Control]) {
        let (tx, rx) = mpsc::channel(8);
        for control in sequence {
            tx.send(*control).await.unwrap();
        }
        follow(handle, None, rx).await.unwrap();
    }

    #[test]
    fn parses_controls() {
        assert_eq!(parse_control(" P "), Some(Control::TogglePause));
        assert_eq!(parse_control("resume"), Some(Control::TogglePause));
        assert_eq!(parse_control("away"), Some(Control::FocusLost));
        assert_eq!(parse_control("stop"), Some(Control::Stop));
        assert_eq!(parse_control("faster"), None);
    }

    #[tokio::test]
    async fn pause_control_reaches_the_run() {
        let handle = live_handle(false);
        handle.start().await.unwrap();

        run_controls(&handle, &[Control::TogglePause, Control::Stop]).await;

        assert!(handle.snapshot().await.unwrap().unwrap().paused);
    }

    #[tokio::test]
    async fn away_pauses_only_with_autopause() {
        let handle = live_handle(false);
        handle.start().await.unwrap();
        run_controls(&handle, &[Control::FocusLost, Control::Stop]).await;
        assert!(!handle.snapshot().await.unwrap().unwrap().paused);

        let handle = live_handle(true);
        handle.start().await.unwrap();
        run_controls(&handle, &[Control::FocusLost, Control::Stop]).await;
        assert!(handle.snapshot().await.unwrap().unwrap().paused);
    }

    #[test]
    fn status_line_shows_pace_and_pause() {
        let snapshot = SessionSnapshot {
            start_time: Utc::now(),
            paused: true,
            distance_meters: 2500.,
            elapsed_seconds: 750,
            pace: Some(300.),
            splits: Vec::new(),
            points: Vec::new(),
        };
        assert_eq!(status_line(&snapshot), "12:30  2.50 km  05:00 /km  splits 0  (paused)");
    }

    #[test]
    fn status_line_without_distance() {
        let snapshot = SessionSnapshot {
            start_time: Utc::now(),
            paused: false,
            distance_meters: 0.,
            elapsed_seconds: 5,
            pace: None,
            splits: Vec::new(),
            points: Vec::new(),
        };
        assert_eq!(status_line(&snapshot), "00:05  0.00 km  —  splits 0");
    }
}
