pub mod backend;
pub mod config;
pub mod error;
pub mod model;
pub mod readiness;
pub mod reconcile;
pub mod smoke;
pub mod supervisor;

pub use backend::{BackingService, InventoryLister, OllamaClient};
pub use config::AppConfig;
pub use error::{BackendError, BootstrapError, ManifestError};
pub use model::{DesiredList, ModelOutcome, ModelRef, PresentSet, ReconcileReport, load_desired};
pub use readiness::{Readiness, wait_for_service, wait_until_ready};
pub use reconcile::reconcile;
pub use smoke::{SmokeReport, run_smoke_test};
pub use supervisor::{Completion, Supervisor, SupervisorState, preload_models};
