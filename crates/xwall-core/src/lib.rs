pub mod auth;
pub mod credentials;
pub mod error;
pub mod filter;
pub mod models;
pub mod poller;
pub mod retry;
pub mod session;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use auth::{
    CredentialOrigin, CredentialResolver, CredentialSource, FileCredentialSource,
    ManualEntrySource, Resolved, SourceOutcome,
};
pub use credentials::{CredentialFile, CredentialSet};
pub use error::AppError;
pub use filter::{RejectReason, Verdict, classify};
pub use models::{Mention, MentionStatus, NewMention, RawPost, SearchSort};
pub use poller::{CycleStats, MentionPoller, PollerConfig, TracingPollerReporter};
pub use retry::{RetryPolicy, retry};
pub use session::Session;
pub use traits::{MentionStore, PersistOutcome, ProviderFactory, SearchProvider};
