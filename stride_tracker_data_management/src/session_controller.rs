use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use stride_tracker_lib::{
    log_entry::LogEntry,
    pace::format_duration,
    run_session::{RunEngine, SessionSnapshot},
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::{
    clock::Clock,
    gpx_util,
    location::{FeedSender, Fix, LocationSource, WatchOptions},
    log_store::LogStore,
    notify::{Notifications, SPLIT_VIBRATION},
    preferences::Preferences,
    LogBook, StrideError,
};

pub const TICK_PERIOD: Duration = Duration::from_secs(1);
const COMMAND_QUEUE_SIZE: usize = 100;

/// Everything the controller reacts to. Location fixes, clock ticks and user actions all
/// arrive on the same queue, so they never run concurrently.
#[derive(Debug)]
pub enum SessionCommand {
    Start(oneshot::Sender<Result<(), StrideError>>),
    Fix(Fix),
    FixFailed(String),
    Tick(DateTime<Utc>),
    TogglePause,
    /// The app went to the background
    FocusLost,
    Stop {
        save: bool,
        reply: oneshot::Sender<Option<LogEntry>>,
    },
    View {
        id: String,
        reply: oneshot::Sender<Result<(), StrideError>>,
    },
    ImportGpx {
        text: String,
        reply: oneshot::Sender<Result<LogEntry, StrideError>>,
    },
    ExportGpx(oneshot::Sender<Result<String, StrideError>>),
    Snapshot(oneshot::Sender<Option<SessionSnapshot>>),
    SetPreferences(Preferences),
    Shutdown,
}

/// Producer tasks of a live run. Dropping this unsubscribes both.
struct Feeds {
    location: JoinHandle<()>,
    clock: JoinHandle<()>,
}

impl Drop for Feeds {
    fn drop(&mut self) {
        self.location.abort();
        self.clock.abort();
    }
}

/// Single owner of the run engine and the log. Runs as its own task; see [`SessionHandle`].
pub struct SessionController<S: LogStore> {
    engine: RunEngine,
    log_book: LogBook<S>,
    notifications: Notifications,
    location: Option<Box<dyn LocationSource>>,
    watch_options: WatchOptions,
    clock: Arc<dyn Clock>,
    feeds: Option<Feeds>,
    commands: Option<mpsc::WeakSender<SessionCommand>>,
    snapshots: watch::Sender<Option<SessionSnapshot>>,
}

impl<S: LogStore> SessionController<S> {
    pub fn new(log_book: LogBook<S>, notifications: Notifications, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine: RunEngine::new(),
            log_book,
            notifications,
            location: None,
            watch_options: WatchOptions::default(),
            clock,
            feeds: None,
            commands: None,
            snapshots: watch::channel(None).0,
        }
    }

    /// Without a location source every start fails with `LocationUnsupported`.
    pub fn with_location(mut self, source: Box<dyn LocationSource>) -> Self {
        self.location = Some(source);
        self
    }

    pub fn with_watch_options(mut self, options: WatchOptions) -> Self {
        self.watch_options = options;
        self
    }

    pub fn spawn(mut self) -> (SessionHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_SIZE);
        self.commands = Some(tx.downgrade());
        let snapshots = self.snapshots.subscribe();

        let task = tokio::spawn(self.run(rx));

        (SessionHandle { commands: tx, snapshots }, task)
    }

    async fn run(mut self, mut commands: mpsc::Receiver<SessionCommand>) {
        tracing::info!("Session controller started");
        while let Some(command) = commands.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        self.feeds = None;
        tracing::info!("Session controller stopped");
    }

    /// Returns false when the controller should shut down.
    fn handle(&mut self, command: SessionCommand) -> bool {
        match command {
            SessionCommand::Start(reply) => {
                let _ = reply.send(self.start());
            }
            SessionCommand::Fix(fix) => self.record_fix(fix),
            SessionCommand::FixFailed(reason) => {
                tracing::warn!("Location fix failed: {}", reason);
            }
            SessionCommand::Tick(now) => {
                if self.engine.tick(now) {
                    self.publish();
                }
            }
            SessionCommand::TogglePause => self.toggle_pause(),
            SessionCommand::FocusLost => {
                let running = self.engine.session().is_some_and(|session| !session.paused);
                if running && self.notifications.preferences().autopause {
                    tracing::info!("Auto-pausing run");
                    self.toggle_pause();
                }
            }
            SessionCommand::Stop { save, reply } => {
                let _ = reply.send(self.stop(save));
            }
            SessionCommand::View { id, reply } => {
                let _ = reply.send(self.view(&id));
            }
            SessionCommand::ImportGpx { text, reply } => {
                let _ = reply.send(self.import_gpx(&text));
            }
            SessionCommand::ExportGpx(reply) => {
                let result = match self.engine.session() {
                    Some(session) => gpx_util::write_gpx(&session.points),
                    None => Err(StrideError::NoRunData),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(self.engine.snapshot());
            }
            SessionCommand::SetPreferences(preferences) => {
                self.notifications.set_preferences(preferences);
            }
            SessionCommand::Shutdown => return false,
        }
        true
    }

    fn start(&mut self) -> Result<(), StrideError> {
        let Some(location) = self.location.as_mut() else {
            tracing::warn!("Cannot start a run without a location source");
            return Err(StrideError::LocationUnsupported);
        };
        let commands = self
            .commands
            .as_ref()
            .and_then(mpsc::WeakSender::upgrade)
            .ok_or(StrideError::ControllerClosed)?;

        self.feeds = None;
        let feed = FeedSender::new(commands);
        self.feeds = Some(Feeds {
            location: location.watch(self.watch_options, feed.clone()),
            clock: spawn_clock(self.clock.clone(), feed),
        });

        self.engine.start_session(self.clock.now());
        tracing::info!("Run started");
        self.notifications.speak("Run started");
        self.publish();
        Ok(())
    }

    fn record_fix(&mut self, fix: Fix) {
        if !self.engine.session().is_some_and(|session| !session.paused) {
            tracing::trace!("Ignoring fix outside a running session");
            return;
        }

        if let Some(split) = self.engine.record_point(fix.latitude, fix.longitude, fix.timestamp) {
            tracing::info!("Kilometer {} in {}s", split.kilometer_index, split.duration_seconds);
            let duration = format_duration(split.duration_seconds);
            let announcement = format!("Kilometer {} in {}", split.kilometer_index, duration);
            self.notifications.speak(&announcement);
            self.notifications.vibrate(&SPLIT_VIBRATION);
        }
        self.publish();
    }

    fn toggle_pause(&mut self) {
        let Some(paused) = self.engine.toggle_pause() else {
            return;
        };
        self.notifications.speak(if paused { "Paused" } else { "Resumed" });
        self.publish();
    }

    fn stop(&mut self, save: bool) -> Option<LogEntry> {
        if !self.engine.is_active() {
            return None;
        }
        self.feeds = None;

        let entry = self.engine.finalize(save, self.clock.now());
        if let Some(entry) = &entry {
            match self.log_book.prepend(entry.clone()) {
                Ok(()) => self.notifications.speak("Run saved"),
                Err(err) => tracing::error!("Failed to save run {}: {}", entry.id, err),
            }
        }
        tracing::info!("Run stopped");
        self.publish();
        entry
    }

    /// Shows a saved run. A live run is discarded first.
    fn view(&mut self, id: &str) -> Result<(), StrideError> {
        let entry = self.log_book.find(id)?;
        self.feeds = None;
        self.engine.view_entry(&entry, self.clock.now());
        self.publish();
        Ok(())
    }

    /// A document that fails to parse leaves the current run and its feeds alone.
    fn import_gpx(&mut self, text: &str) -> Result<LogEntry, StrideError> {
        let coordinates = gpx_util::read_gpx_coordinates(text)?;
        self.feeds = None;
        let result = self.log_book.import_track(&mut self.engine, &coordinates, self.clock.now());
        if result.is_ok() {
            self.notifications.speak("Run saved");
        }
        self.publish();
        result
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.engine.snapshot());
    }
}

fn spawn_clock(clock: Arc<dyn Clock>, feed: FeedSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_PERIOD);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            if !feed.tick(clock.now()).await {
                break;
            }
        }
    })
}

/// Cloneable front of a running [`SessionController`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    snapshots: watch::Receiver<Option<SessionSnapshot>>,
}

impl SessionHandle {
    async fn send(&self, command: SessionCommand) -> Result<(), StrideError> {
        self.commands.send(command).await.map_err(|_| StrideError::ControllerClosed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, StrideError> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply)).await?;
        response.await.map_err(|_| StrideError::ControllerClosed)
    }

    pub async fn start(&self) -> Result<(), StrideError> {
        self.request(SessionCommand::Start).await?
    }

    pub async fn toggle_pause(&self) -> Result<(), StrideError> {
        self.send(SessionCommand::TogglePause).await
    }

    pub async fn focus_lost(&self) -> Result<(), StrideError> {
        self.send(SessionCommand::FocusLost).await
    }

    /// Ends the run, returning the saved entry when `save` is set.
    pub async fn stop(&self, save: bool) -> Result<Option<LogEntry>, StrideError> {
        self.request(|reply| SessionCommand::Stop { save, reply }).await
    }

    pub async fn view(&self, id: &str) -> Result<(), StrideError> {
        let id = id.to_string();
        self.request(|reply| SessionCommand::View { id, reply }).await?
    }

    pub async fn import_gpx(&self, text: String) -> Result<LogEntry, StrideError> {
        self.request(|reply| SessionCommand::ImportGpx { text, reply }).await?
    }

    pub async fn export_gpx(&self) -> Result<String, StrideError> {
        self.request(SessionCommand::ExportGpx).await?
    }

    /// State after every command sent before this call.
    pub async fn snapshot(&self) -> Result<Option<SessionSnapshot>, StrideError> {
        self.request(SessionCommand::Snapshot).await
    }

    pub async fn set_preferences(&self, preferences: Preferences) -> Result<(), StrideError> {
        self.send(SessionCommand::SetPreferences(preferences)).await
    }

    pub async fn shutdown(&self) -> Result<(), StrideError> {
        self.send(SessionCommand::Shutdown).await
    }

    /// Lets another producer push fixes and ticks into the queue.
    pub fn feed(&self) -> FeedSender {
        FeedSender::new(self.commands.clone())
    }

    /// Latest published state, for renderers.
    pub fn subscribe(&self) -> watch::Receiver<Option<SessionSnapshot>> {
        self.snapshots.clone()
    }
}
