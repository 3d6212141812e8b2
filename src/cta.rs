use chrono::{DateTime, Duration, Utc};

use crate::storage::KeyValueStore;

/// Storage key holding the dismissal time as epoch milliseconds.
pub const STICKY_CTA_DISMISSED_KEY: &str = "stickyCtaDismissed";

/// How long a dismissed sticky banner stays hidden.
pub const DISMISS_WINDOW_HOURS: i64 = 12;

pub const TRIAL_REDIRECT: &str = "/inscricao";
pub const BUY_REDIRECT: &str = "https://urolaser.com.br/inscricao-representante";

/// Where a sticky CTA click should send the visitor.
pub fn redirect_for(action: &str) -> Option<&'static str> {
    match action {
        "trial" => Some(TRIAL_REDIRECT),
        "buy" => Some(BUY_REDIRECT),
        _ => None,
    }
}

/// Visibility state of the promotional sticky call-to-action banner.
pub struct StickyCta<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> StickyCta<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// Hidden only while a readable dismissal is younger than the window.
    pub fn is_visible(&self, now: DateTime<Utc>) -> bool {
        let Some(raw) = self.store.get(STICKY_CTA_DISMISSED_KEY) else {
            return true;
        };

        let Ok(dismissed_at) = raw.trim().parse::<i64>() else {
            tracing::warn!("Ignoring unreadable CTA dismissal value: {:?}", raw);
            return true;
        };

        let window = Duration::hours(DISMISS_WINDOW_HOURS).num_milliseconds();
        now.timestamp_millis() - dismissed_at >= window
    }

    pub fn dismiss(&self, now: DateTime<Utc>) {
        self.store.set(
            STICKY_CTA_DISMISSED_KEY,
            now.timestamp_millis().to_string(),
        );
    }
}
