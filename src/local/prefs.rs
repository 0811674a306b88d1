use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{KvStore, LocalStoreError};

const USERNAME_KEY: &str = "username";
const THEME_KEY: &str = "theme";
const CONTINUE_ENABLED_KEY: &str = "continue_enabled";
const JOINED_AT_KEY: &str = "joined_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Crimson,
    Blood,
    Inferno,
    Void,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Theme::Crimson, Theme::Blood, Theme::Inferno, Theme::Void];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Crimson => "crimson",
            Theme::Blood => "blood",
            Theme::Inferno => "inferno",
            Theme::Void => "void",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Theme::Crimson => "#dc2626",
            Theme::Blood => "#7f1d1d",
            Theme::Inferno => "#ef4444",
            Theme::Void => "#991b1b",
        }
    }
}

impl FromStr for Theme {
    type Err = LocalStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Theme::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| LocalStoreError::Invalid(format!("unknown theme {}", s)))
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower-cased, 3-20 characters of `[a-z0-9_]`.
pub fn normalize_username(raw: &str) -> Result<String, LocalStoreError> {
    let name = raw.trim().to_lowercase();
    let valid = (3..=20).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(LocalStoreError::Invalid(
            "3-20 chars, letters, numbers, underscore only".into(),
        ))
    }
}

/// Device preferences that are not part of reading progress.
#[derive(Clone)]
pub struct Preferences {
    kv: Arc<dyn KvStore>,
}

impl Preferences {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub fn username(&self) -> Option<String> {
        self.kv.get(USERNAME_KEY).filter(|u| !u.is_empty())
    }

    /// Validates and stores the handle, returning the normalized form.
    pub fn set_username(&self, raw: &str) -> Result<String, LocalStoreError> {
        let name = normalize_username(raw)?;
        self.kv.set(USERNAME_KEY, &name)?;
        Ok(name)
    }

    /// Unknown stored values fall back to the default theme.
    pub fn theme(&self) -> Theme {
        self.kv
            .get(THEME_KEY)
            .and_then(|t| t.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), LocalStoreError> {
        self.kv.set(THEME_KEY, theme.as_str())
    }

    pub fn continue_enabled(&self) -> bool {
        self.kv.get(CONTINUE_ENABLED_KEY).as_deref() != Some("false")
    }

    pub fn set_continue_enabled(&self, enabled: bool) -> Result<(), LocalStoreError> {
        self.kv
            .set(CONTINUE_ENABLED_KEY, if enabled { "true" } else { "false" })
    }

    /// First-seen timestamp, recorded on the first call.
    pub fn joined_at(&self) -> Result<DateTime<Utc>, LocalStoreError> {
        if let Some(raw) = self.kv.get(JOINED_AT_KEY) {
            if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
                return Ok(ts.with_timezone(&Utc));
            }
        }
        let now = Utc::now();
        self.kv.set(JOINED_AT_KEY, &now.to_rfc3339())?;
        Ok(now)
    }
}
