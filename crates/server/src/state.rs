use std::sync::Arc;

use galleyforge_core::{
    ots::ConversionClient, progress::ProgressStore, tracker::JobTracker, AccessKeyValidator,
    Authenticator, BatchOrchestrator, Config, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    access_key_validator: AccessKeyValidator,
    tracker: Arc<dyn JobTracker>,
    progress: Arc<dyn ProgressStore>,
    /// None when no [ots] section is configured; conversion endpoints
    /// respond 503 in that case.
    client: Option<Arc<dyn ConversionClient>>,
    orchestrator: Option<Arc<BatchOrchestrator>>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        access_key_validator: AccessKeyValidator,
        tracker: Arc<dyn JobTracker>,
        progress: Arc<dyn ProgressStore>,
        client: Option<Arc<dyn ConversionClient>>,
        orchestrator: Option<Arc<BatchOrchestrator>>,
    ) -> Self {
        Self {
            config,
            authenticator,
            access_key_validator,
            tracker,
            progress,
            client,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn access_key_validator(&self) -> &AccessKeyValidator {
        &self.access_key_validator
    }

    pub fn tracker(&self) -> &Arc<dyn JobTracker> {
        &self.tracker
    }

    pub fn progress(&self) -> &Arc<dyn ProgressStore> {
        &self.progress
    }

    pub fn client(&self) -> Option<&Arc<dyn ConversionClient>> {
        self.client.as_ref()
    }

    pub fn orchestrator(&self) -> Option<&Arc<BatchOrchestrator>> {
        self.orchestrator.as_ref()
    }
}
