use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::PostTime;

/// A playable track: the name shown in lists and announcements and a link to it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Song {
    pub name: String,
    pub url: String,
}

impl Song {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { name: name.into(), url: url.into() }
    }
}

/// Songs and settings of a single server.
///
/// Every field defaults, so documents written before a field existed still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerSettings {
    #[serde(default)]
    pub songs: Vec<Song>,
    /// Post time as `HH:MM`.
    #[serde(default)]
    pub daily_time: Option<String>,
    /// Offset from UTC in hours.
    #[serde(default)]
    pub timezone: i32,
    #[serde(default)]
    pub post_channel: Option<u64>,
    #[serde(default)]
    pub ping_roles: Vec<u64>,
    /// Roles allowed to change the settings. Empty means everyone is.
    #[serde(default)]
    pub config_roles: Vec<u64>,
}

impl ServerSettings {
    /// The parsed post time, `None` when it is unset or can't be parsed.
    pub fn post_time(&self) -> Option<PostTime> {
        let daily_time = self.daily_time.as_deref()?;

        match daily_time.parse() {
            Ok(time) => Some(time),
            Err(error) => {
                warn!(%error, "Ignoring unparsable post time");
                None
            }
        }
    }

    /// Whether the daily song should go out at `now`.
    ///
    /// A server needs both a post time and a channel. Without `apply_offset` the post time is
    /// compared against UTC as is and the stored timezone is ignored.
    pub fn is_due_at(&self, now: &DateTime<Utc>, apply_offset: bool) -> bool {
        if self.post_channel.is_none() {
            return false;
        }

        let Some(post_time) = self.post_time() else {
            return false;
        };

        if apply_offset {
            now.checked_add_signed(Duration::hours(self.timezone.into()))
                .is_some_and(|local| post_time.matches(&local))
        } else {
            post_time.matches(now)
        }
    }

    /// Whether a member holding `member_roles` may change these settings.
    pub fn allows_configuration_by(&self, member_roles: &[u64]) -> bool {
        self.config_roles.is_empty()
            || self.config_roles.iter().any(|role| member_roles.contains(role))
    }

    /// Role mentions for the announcement, `None` when no roles are pinged.
    pub fn ping_mentions(&self) -> Option<String> {
        if self.ping_roles.is_empty() {
            return None;
        }

        Some(
            self.ping_roles
                .iter()
                .map(|role_id| format!("<@&{}>", role_id))
                .collect::<Vec<_>>()
                .join(" "),
        )
    }
}
