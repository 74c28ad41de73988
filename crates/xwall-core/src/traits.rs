use std::future::Future;

use crate::credentials::CredentialSet;
use crate::error::AppError;
use crate::models::{Mention, MentionStatus, NewMention, RawPost, SearchSort};

/// Searches the social network for recent posts.
///
/// Implementations are assumed unreliable: every error is treated as
/// transient by the caller and retried.
pub trait SearchProvider: Send + Sync {
    fn search(
        &self,
        query: &str,
        sort: SearchSort,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<RawPost>, AppError>> + Send;
}

/// Builds an authenticated [`SearchProvider`] from a credential set.
///
/// Applying credentials can fail (e.g. a token the client rejects outright),
/// in which case the credential resolver moves on to the next source.
pub trait ProviderFactory: Send + Sync {
    type Provider: SearchProvider;

    fn connect(&self, credentials: &CredentialSet) -> Result<Self::Provider, AppError>;
}

/// Result of a conflict-aware insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// A new row was written. Carries the store-assigned id when the store
    /// reports one (a UUID, an identity integer, ...).
    Inserted(Option<String>),
    /// A row with the same `source_id` already existed; nothing was written.
    Duplicate,
}

/// Persists mentions with ignore-duplicate semantics on `source_id`.
pub trait MentionStore: Send + Sync + Clone {
    /// Conflict-aware insert. A row with the same `source_id` already present
    /// yields [`PersistOutcome::Duplicate`], never an error.
    fn insert(
        &self,
        mention: &NewMention,
    ) -> impl Future<Output = Result<PersistOutcome, AppError>> + Send;

    fn get_by_source_id(
        &self,
        source_id: &str,
    ) -> impl Future<Output = Result<Option<Mention>, AppError>> + Send;

    /// Most recent mentions first, optionally filtered by status.
    fn list_recent(
        &self,
        status: Option<MentionStatus>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Mention>, AppError>> + Send;

    fn count_by_status(
        &self,
        status: MentionStatus,
    ) -> impl Future<Output = Result<i64, AppError>> + Send;

    /// Cheap round trip proving the store is reachable.
    fn health_check(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
