pub mod archive;
pub mod auth;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod ots;
pub mod progress;
pub mod submission;
pub mod testing;
pub mod tracker;

pub use auth::{
    create_authenticator, AccessKeyValidator, ApiKeyAuthenticator, AuthError, AuthRequest,
    Authenticator, Identity, NoneAuthenticator, Role,
};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthMethod, Config, ConfigError,
    SanitizedConfig,
};
pub use orchestrator::{
    BatchConfig, BatchError, BatchItem, BatchOrchestrator, BatchOutcome, BatchRequest,
    TriggerError, TriggeredJob,
};
