use crate::preferences::Preferences;

pub const DEFAULT_VIBRATION: [u32; 1] = [120];
pub const SPLIT_VIBRATION: [u32; 3] = [80, 50, 80];
pub const COMPLETED_VIBRATION: [u32; 5] = [60, 40, 60, 40, 120];

/// Where announcements end up: speech synthesis and a vibration motor on a device.
pub trait NotificationSink: Send {
    fn speak(&mut self, text: &str);

    /// Alternating on/off durations in milliseconds.
    fn vibrate(&mut self, pattern: &[u32]);
}

/// Writes announcements to the log.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn speak(&mut self, text: &str) {
        tracing::info!(target: "stride::voice", "{}", text);
    }

    fn vibrate(&mut self, pattern: &[u32]) {
        tracing::debug!(target: "stride::haptics", "{:?}", pattern);
    }
}

/// Applies the voice and haptics preferences before anything reaches the sink.
pub struct Notifications {
    preferences: Preferences,
    sink: Box<dyn NotificationSink>,
}

impl Notifications {
    pub fn new(preferences: Preferences, sink: Box<dyn NotificationSink>) -> Self {
        Self { preferences, sink }
    }

    pub fn preferences(&self) -> Preferences {
        self.preferences
    }

    pub fn set_preferences(&mut self, preferences: Preferences) {
        self.preferences = preferences;
    }

    pub fn speak(&mut self, text: &str) {
        if self.preferences.voice {
            self.sink.speak(text);
        }
    }

    pub fn vibrate(&mut self, pattern: &[u32]) {
        if self.preferences.haptics {
            self.sink.vibrate(pattern);
        }
    }
}
