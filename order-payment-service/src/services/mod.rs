pub mod cashfree;
pub mod credentials;
pub mod database;
pub mod formatting;
pub mod initiation;
pub mod memory;
pub mod metrics;
pub mod repository;
pub mod status;
pub mod verification;
pub mod webhook;

pub use cashfree::CashfreeClient;
pub use credentials::CredentialCipher;
pub use database::Database;
pub use initiation::{InitiationOutcome, PaymentInitiationService};
pub use memory::InMemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use repository::Repositories;
pub use verification::{PaymentVerificationService, VerificationOutcome};
