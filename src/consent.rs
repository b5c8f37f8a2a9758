use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use thiserror::Error;

use crate::integrations::IntegrationMap;
use crate::models::{ConsentCategory, ConsentPreferences, ConsentRecord};
use crate::storage::{DurableStorageState, StorageError};

/// Storage key holding the serialized four-flag object.
pub const CONSENT_KEY: &str = "cookie-consent";
/// Storage key holding the RFC 3339 timestamp of the last choice.
pub const CONSENT_DATE_KEY: &str = "cookie-consent-date";

/// ConsentError
///
/// Failures surfaced by `save` and `reset`. `load` never returns one.
#[derive(Debug, Error)]
pub enum ConsentError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("invalid consent data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid consent timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("consent timestamp missing")]
    MissingTimestamp,
}

/// ConsentStore
///
/// The user's cookie-consent choice, mirrored to durable storage. Every
/// transition is explicit: `save` records a choice, `reset` withdraws it. There
/// is no expiry.
pub struct ConsentStore {
    storage: DurableStorageState,
    integrations: IntegrationMap,
    record: Option<ConsentRecord>,
}

impl ConsentStore {
    /// Creates an empty store without touching storage.
    pub fn new(storage: DurableStorageState, integrations: IntegrationMap) -> Self {
        Self {
            storage,
            integrations,
            record: None,
        }
    }

    /// Creates a store and immediately loads the persisted choice.
    pub fn open(storage: DurableStorageState, integrations: IntegrationMap) -> Self {
        let mut store = Self::new(storage, integrations);
        store.load();
        store
    }

    /// load
    ///
    /// Reads the persisted record. Unreadable or malformed data is logged and
    /// treated as "no consent recorded". A valid record is applied so the
    /// integrations match the stored choice.
    pub fn load(&mut self) -> Option<&ConsentRecord> {
        self.record = match self.read_record() {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load stored cookie consent");
                None
            }
        };

        if let Some(record) = &self.record {
            tracing::debug!(timestamp = %record.timestamp, "Loaded stored cookie consent");
            self.apply(&record.preferences);
        }
        self.record.as_ref()
    }

    fn read_record(&self) -> Result<Option<ConsentRecord>, ConsentError> {
        let Some(raw) = self.storage.get(CONSENT_KEY)? else {
            return Ok(None);
        };
        let preferences: ConsentPreferences = serde_json::from_str(&raw)?;
        let date = self
            .storage
            .get(CONSENT_DATE_KEY)?
            .ok_or(ConsentError::MissingTimestamp)?;
        let timestamp = DateTime::parse_from_rfc3339(&date)?.with_timezone(&Utc);

        Ok(Some(ConsentRecord {
            preferences: preferences.normalized(),
            timestamp,
        }))
    }

    /// save
    ///
    /// Records a new choice: stamps it, writes the flags then the timestamp (no
    /// rollback if the second write fails), replaces the in-memory record and
    /// applies it.
    pub fn save(&mut self, preferences: ConsentPreferences) -> Result<&ConsentRecord, ConsentError> {
        let preferences = preferences.normalized();
        // Millisecond precision, matching what the stored string can represent.
        let timestamp = Utc::now().trunc_subsecs(3);

        self.storage
            .set(CONSENT_KEY, &serde_json::to_string(&preferences)?)?;
        self.storage.set(
            CONSENT_DATE_KEY,
            &timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;

        tracing::info!(
            analytics = preferences.analytics,
            marketing = preferences.marketing,
            preferences = preferences.preferences,
            "Cookie consent saved"
        );

        self.apply(&preferences);
        Ok(&*self.record.insert(ConsentRecord {
            preferences,
            timestamp,
        }))
    }

    /// Banner shortcut: grant every category.
    pub fn accept_all(&mut self) -> Result<&ConsentRecord, ConsentError> {
        self.save(ConsentPreferences::all_granted())
    }

    /// Banner shortcut: necessary cookies only.
    pub fn accept_necessary_only(&mut self) -> Result<&ConsentRecord, ConsentError> {
        self.save(ConsentPreferences::necessary_only())
    }

    /// apply
    ///
    /// Switches each optional integration to match its flag. The necessary
    /// category toggles nothing.
    pub fn apply(&self, preferences: &ConsentPreferences) {
        for category in ConsentCategory::OPTIONAL {
            self.integrations
                .set_enabled(category, preferences.get(category));
        }
    }

    /// reset
    ///
    /// Withdraws consent: both keys are removed, the record is cleared and every
    /// optional integration is disabled. Memory and integrations are reset even if
    /// a storage removal fails; the first failure is returned afterwards.
    pub fn reset(&mut self) -> Result<(), ConsentError> {
        let consent = self.storage.remove(CONSENT_KEY);
        let date = self.storage.remove(CONSENT_DATE_KEY);

        self.record = None;
        for category in ConsentCategory::OPTIONAL {
            self.integrations.set_enabled(category, false);
        }
        tracing::info!("Cookie consent reset");

        consent?;
        date?;
        Ok(())
    }

    /// is_allowed
    ///
    /// False for every category until a choice has been recorded.
    pub fn is_allowed(&self, category: ConsentCategory) -> bool {
        self.record
            .as_ref()
            .is_some_and(|record| record.preferences.get(category))
    }

    pub fn has_consented(&self) -> bool {
        self.record.is_some()
    }

    pub fn record(&self) -> Option<&ConsentRecord> {
        self.record.as_ref()
    }
}
