use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Consent Schemas (shared with the browser bundle) ---

/// ConsentPreferences
///
/// The four independent consent flags. `necessary` is always true once a choice
/// has been recorded; the store forces it on save and on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
#[ts(export)]
pub struct ConsentPreferences {
    pub necessary: bool,
    pub analytics: bool,
    pub marketing: bool,
    pub preferences: bool,
}

impl Default for ConsentPreferences {
    /// Only the necessary category, which is what "reject all" records.
    fn default() -> Self {
        Self {
            necessary: true,
            analytics: false,
            marketing: false,
            preferences: false,
        }
    }
}

impl ConsentPreferences {
    pub fn all_granted() -> Self {
        Self {
            necessary: true,
            analytics: true,
            marketing: true,
            preferences: true,
        }
    }

    pub fn necessary_only() -> Self {
        Self::default()
    }

    pub fn get(&self, category: ConsentCategory) -> bool {
        match category {
            ConsentCategory::Necessary => self.necessary,
            ConsentCategory::Analytics => self.analytics,
            ConsentCategory::Marketing => self.marketing,
            ConsentCategory::Preferences => self.preferences,
        }
    }

    /// Copy with the necessary flag pinned on.
    pub fn normalized(self) -> Self {
        Self {
            necessary: true,
            ..self
        }
    }
}

/// ConsentCategory
///
/// Tracking categories a user can consent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ConsentCategory {
    Necessary,
    Analytics,
    Marketing,
    Preferences,
}

impl ConsentCategory {
    /// Categories the user can switch off; `Necessary` drives no integration.
    pub const OPTIONAL: [ConsentCategory; 3] = [
        ConsentCategory::Analytics,
        ConsentCategory::Marketing,
        ConsentCategory::Preferences,
    ];
}

impl fmt::Display for ConsentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsentCategory::Necessary => "necessary",
            ConsentCategory::Analytics => "analytics",
            ConsentCategory::Marketing => "marketing",
            ConsentCategory::Preferences => "preferences",
        };
        f.write_str(name)
    }
}

/// ConsentRecord
///
/// A recorded choice plus the moment it was made. Replaced wholesale on every
/// choice; there is no partial update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsentRecord {
    pub preferences: ConsentPreferences,
    #[ts(type = "string")]
    pub timestamp: DateTime<Utc>,
}

/// ConsentState
///
/// Value sent to the tag manager for one storage scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ConsentState {
    Granted,
    Denied,
}

impl From<bool> for ConsentState {
    fn from(granted: bool) -> Self {
        if granted {
            ConsentState::Granted
        } else {
            ConsentState::Denied
        }
    }
}

/// ConsentUpdate
///
/// Payload of the tag manager's consent-update call. Field names follow the
/// analytics script's own storage scope names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ConsentUpdate {
    pub analytics_storage: ConsentState,
    pub ad_storage: ConsentState,
}

impl ConsentUpdate {
    pub fn uniform(granted: bool) -> Self {
        let state = ConsentState::from(granted);
        Self {
            analytics_storage: state,
            ad_storage: state,
        }
    }
}

// --- Response Payloads (Output Schemas) ---

/// BackendHealth
///
/// Reachability of the external backend, as shown by the site's status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum BackendHealth {
    Online,
    Offline,
}

/// BackendStatus
///
/// Response of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct BackendStatus {
    pub backend: BackendHealth,
    #[ts(type = "string")]
    pub checked_at: DateTime<Utc>,
}

/// ErrorResponse
///
/// Generic error body; never carries upstream error details.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorResponse {
    pub error: String,
}
