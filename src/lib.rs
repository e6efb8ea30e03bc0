// Donation Console - Core Library
// Exposes the reconciliation workflows for the console binary and the tests

pub mod models;
pub mod error;
pub mod session;
pub mod config;
pub mod request;
pub mod backend;
pub mod journal;
pub mod claim;        // Staff: claim an unclaimed bank transaction
pub mod status_view;  // Buckets, manual settlement, statement upload
pub mod dispute;      // Admin: approve / reject claims
pub mod export;
pub mod format;

// Re-export commonly used types
pub use models::{
    BankTransaction, ClaimRequest, ClaimSummary, DisputeStatus, Donation, Page, PageRequest,
    PendingReconciliation, ReconciliationStatus, StaffClaim,
};
pub use error::{ConsoleError, ConsoleResult};
pub use session::{Role, Session};
pub use config::ConsoleConfig;
pub use request::{Applied, RequestTracker};
pub use backend::{
    BackendCall, FakeBackend, HttpBackend, JournaledBackend, ReconciliationBackend,
    StatementUpload,
};
pub use journal::{ActionJournal, ActionRecord, JournalAction};
pub use claim::{ClaimWorkflow, StaffQueue};
pub use status_view::{Bucket, StatusView};
pub use dispute::{ClaimActions, DisputeDesk};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
