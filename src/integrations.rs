use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{ConsentCategory, ConsentUpdate};

/// TagManager
///
/// The external analytics script's consent primitive. The script is always
/// loaded; only its permission to use storage is switched.
pub trait TagManager: Send + Sync {
    fn update_consent(&self, update: ConsentUpdate);
}

/// TracingTagManager
///
/// Default tag manager: records each consent update in the structured log.
pub struct TracingTagManager;

impl TagManager for TracingTagManager {
    fn update_consent(&self, update: ConsentUpdate) {
        tracing::info!(
            analytics_storage = ?update.analytics_storage,
            ad_storage = ?update.ad_storage,
            "Analytics consent updated"
        );
    }
}

/// IntegrationToggle
///
/// A downstream integration gated by one consent category.
pub trait IntegrationToggle: Send + Sync {
    fn enable(&self);
    fn disable(&self);

    fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enable()
        } else {
            self.disable()
        }
    }
}

/// AnalyticsIntegration
///
/// Grants or denies both storage scopes on the tag manager.
pub struct AnalyticsIntegration {
    tag_manager: Arc<dyn TagManager>,
}

impl AnalyticsIntegration {
    pub fn new(tag_manager: Arc<dyn TagManager>) -> Self {
        Self { tag_manager }
    }
}

impl IntegrationToggle for AnalyticsIntegration {
    fn enable(&self) {
        self.tag_manager.update_consent(ConsentUpdate::uniform(true));
    }

    fn disable(&self) {
        self.tag_manager.update_consent(ConsentUpdate::uniform(false));
    }
}

/// NoopIntegration
///
/// Placeholder for categories with no integration wired yet (marketing, preferences).
pub struct NoopIntegration;

impl IntegrationToggle for NoopIntegration {
    fn enable(&self) {}
    fn disable(&self) {}
}

/// IntegrationMap
///
/// Capability map from consent category to the integration it gates. Categories
/// without an entry toggle nothing; `Necessary` is never dispatched.
#[derive(Default, Clone)]
pub struct IntegrationMap {
    handlers: HashMap<ConsentCategory, Arc<dyn IntegrationToggle>>,
}

impl IntegrationMap {
    /// Site wiring: analytics drives the tag manager, marketing and preferences
    /// are reserved no-ops.
    pub fn with_tag_manager(tag_manager: Arc<dyn TagManager>) -> Self {
        Self::default()
            .register(
                ConsentCategory::Analytics,
                Arc::new(AnalyticsIntegration::new(tag_manager)),
            )
            .register(ConsentCategory::Marketing, Arc::new(NoopIntegration))
            .register(ConsentCategory::Preferences, Arc::new(NoopIntegration))
    }

    /// Site wiring over the default `TracingTagManager`, for deployments with no
    /// analytics script attached.
    pub fn logged() -> Self {
        Self::with_tag_manager(Arc::new(TracingTagManager))
    }

    pub fn register(mut self, category: ConsentCategory, handler: Arc<dyn IntegrationToggle>) -> Self {
        self.handlers.insert(category, handler);
        self
    }

    pub fn set_enabled(&self, category: ConsentCategory, enabled: bool) {
        if category == ConsentCategory::Necessary {
            return;
        }
        if let Some(handler) = self.handlers.get(&category) {
            handler.set_enabled(enabled);
        }
    }
}
