//! Checked deployment of generated artifacts.
//!
//! A deployment moves through `Validating -> Deploying -> Verifying` and
//! ends in `Succeeded` or `Failed`. Invalid artifacts or config never reach
//! the remote API; the create call runs under the retrying executor; a
//! failed health probe only adds a warning.

mod config;
mod orchestrator;
mod remote;
mod stage;

pub use config::{idempotency_key, DeploymentConfig, DeploymentRequest, COMMON_LOCATIONS};
pub use orchestrator::{
    DeploymentFailure, DeploymentOrchestrator, DeploymentPhase, DeploymentRecord,
};
#[cfg(feature = "http-probe")]
pub use remote::HttpHealthProbe;
pub use remote::{HealthProbe, HealthStatus, RemoteDeployer, RemoteError, ResourceHandle};
pub use stage::{DeploymentStage, DEPLOYMENT_RECORD_METADATA, PROJECT_FILES_KEY};
