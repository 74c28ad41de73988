//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::auth::{CredentialOrigin, CredentialSource, SourceOutcome};
use crate::credentials::CredentialSet;
use crate::error::AppError;
use crate::models::{Mention, MentionStatus, NewMention, PostAuthor, RawPost, SearchSort};
use crate::poller::{PollerEvent, PollerReporter};
use crate::traits::{MentionStore, PersistOutcome, ProviderFactory, SearchProvider};

// ---------------------------------------------------------------------------
// MockSearchProvider
// ---------------------------------------------------------------------------

/// Recorded search call: (query, sort, limit).
pub type SearchCall = (String, SearchSort, usize);

/// Mock provider returning queued batches.
#[derive(Clone)]
pub struct MockSearchProvider {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns an empty batch.
    batches: Arc<Mutex<Vec<Result<Vec<RawPost>, AppError>>>>,
    pub queries: Arc<Mutex<Vec<SearchCall>>>,
}

impl MockSearchProvider {
    pub fn with_batches(batches: Vec<Result<Vec<RawPost>, AppError>>) -> Self {
        Self {
            batches: Arc::new(Mutex::new(batches)),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

impl SearchProvider for MockSearchProvider {
    async fn search(
        &self,
        query: &str,
        sort: SearchSort,
        limit: usize,
    ) -> Result<Vec<RawPost>, AppError> {
        self.queries
            .lock()
            .unwrap()
            .push((query.to_string(), sort, limit));

        let mut batches = self.batches.lock().unwrap();
        if batches.is_empty() {
            Ok(Vec::new())
        } else {
            batches.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockProviderFactory
// ---------------------------------------------------------------------------

/// Factory that builds an empty [`MockSearchProvider`], optionally rejecting
/// one auth token to simulate credentials the provider refuses.
#[derive(Clone, Default)]
pub struct MockProviderFactory {
    rejected_token: Option<String>,
    pub connected: Arc<Mutex<Vec<CredentialSet>>>,
}

impl MockProviderFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(auth_token: &str) -> Self {
        Self {
            rejected_token: Some(auth_token.to_string()),
            connected: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ProviderFactory for MockProviderFactory {
    type Provider = MockSearchProvider;

    fn connect(&self, credentials: &CredentialSet) -> Result<MockSearchProvider, AppError> {
        if self.rejected_token.as_deref() == credentials.auth_token() {
            return Err(AppError::CredentialError("token rejected".into()));
        }
        self.connected.lock().unwrap().push(credentials.clone());
        Ok(MockSearchProvider::with_batches(Vec::new()))
    }
}

// ---------------------------------------------------------------------------
// MockCredentialSource
// ---------------------------------------------------------------------------

/// Credential source with a fixed outcome that counts how often it was asked.
#[derive(Clone)]
pub struct MockCredentialSource {
    origin: CredentialOrigin,
    outcome: SourceOutcome,
    calls: Arc<AtomicUsize>,
}

impl MockCredentialSource {
    pub fn found(origin: CredentialOrigin, auth_token: &str, csrf_token: &str) -> Self {
        Self::with_set(origin, CredentialSet::new(auth_token, csrf_token))
    }

    pub fn with_set(origin: CredentialOrigin, set: CredentialSet) -> Self {
        Self {
            origin,
            outcome: SourceOutcome::Found(set),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unavailable(origin: CredentialOrigin) -> Self {
        Self {
            origin,
            outcome: SourceOutcome::Unavailable("mock source has nothing".into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialSource for MockCredentialSource {
    fn origin(&self) -> CredentialOrigin {
        self.origin
    }

    async fn load(&self) -> SourceOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store honouring the unique `source_id` contract.
#[derive(Clone)]
pub struct MockStore {
    pub inserted: Arc<Mutex<Vec<NewMention>>>,
    known: Arc<Mutex<HashSet<String>>>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    attempts: Arc<AtomicUsize>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self {
            inserted: Arc::new(Mutex::new(Vec::new())),
            known: Arc::new(Mutex::new(HashSet::new())),
            fail_on: None,
            panic_on: None,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Store that already holds rows for the given source ids.
    pub fn with_existing(source_ids: &[String]) -> Self {
        let store = Self::empty();
        store
            .known
            .lock()
            .unwrap()
            .extend(source_ids.iter().cloned());
        store
    }

    /// Store that returns a database error for one source id.
    pub fn failing_on(source_id: &str) -> Self {
        Self {
            fail_on: Some(source_id.to_string()),
            ..Self::empty()
        }
    }

    /// Store that panics when asked to write one source id.
    pub fn panicking_on(source_id: &str) -> Self {
        Self {
            panic_on: Some(source_id.to_string()),
            ..Self::empty()
        }
    }

    /// Number of insert calls, including failed ones.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MentionStore for MockStore {
    async fn insert(&self, mention: &NewMention) -> Result<PersistOutcome, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if self.panic_on.as_deref() == Some(mention.source_id.as_str()) {
            panic!("mock store exploded on {}", mention.source_id);
        }
        if self.fail_on.as_deref() == Some(mention.source_id.as_str()) {
            return Err(AppError::DatabaseError("connection reset by peer".into()));
        }

        if !self.known.lock().unwrap().insert(mention.source_id.clone()) {
            return Ok(PersistOutcome::Duplicate);
        }
        self.inserted.lock().unwrap().push(mention.clone());
        Ok(PersistOutcome::Inserted(Some(Uuid::new_v4().to_string())))
    }

    async fn get_by_source_id(&self, source_id: &str) -> Result<Option<Mention>, AppError> {
        let inserted = self.inserted.lock().unwrap();
        Ok(inserted
            .iter()
            .find(|m| m.source_id == source_id)
            .map(make_test_mention))
    }

    async fn list_recent(
        &self,
        status: Option<MentionStatus>,
        limit: usize,
    ) -> Result<Vec<Mention>, AppError> {
        let inserted = self.inserted.lock().unwrap();
        Ok(inserted
            .iter()
            .rev()
            .filter(|m| status.is_none_or(|s| m.status == s))
            .take(limit)
            .map(make_test_mention)
            .collect())
    }

    async fn count_by_status(&self, status: MentionStatus) -> Result<i64, AppError> {
        let inserted = self.inserted.lock().unwrap();
        Ok(inserted.iter().filter(|m| m.status == status).count() as i64)
    }

    async fn health_check(&self) -> Result<(), AppError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock poller reporter that records event labels. Optionally cancels a
/// token once a number of cycles have completed.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    cancel_after: Option<(u64, CancellationToken)>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelling_after(cycles: u64, token: CancellationToken) -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            cancel_after: Some((cycles, token)),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PollerReporter for MockReporter {
    fn report(&self, event: PollerEvent<'_>) {
        let label = match &event {
            PollerEvent::Started { .. } => "Started",
            PollerEvent::CycleStarted { .. } => "CycleStarted",
            PollerEvent::SearchEmpty { .. } => "SearchEmpty",
            PollerEvent::PostRejected { .. } => "PostRejected",
            PollerEvent::MentionSaved { .. } => "MentionSaved",
            PollerEvent::DuplicateSkipped { .. } => "DuplicateSkipped",
            PollerEvent::PersistFailed { .. } => "PersistFailed",
            PollerEvent::CycleCompleted { .. } => "CycleCompleted",
            PollerEvent::CycleAborted { .. } => "CycleAborted",
            PollerEvent::Sleeping { .. } => "Sleeping",
            PollerEvent::Stopped { .. } => "Stopped",
        };
        self.events.lock().unwrap().push(label.to_string());

        if let (PollerEvent::CycleCompleted { cycle, .. }, Some((limit, token))) =
            (&event, &self.cancel_after)
            && cycle >= limit
        {
            token.cancel();
        }
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Create an original (non-retweet, non-reply, non-quote) post.
pub fn make_post(id: &str, handle: &str) -> RawPost {
    RawPost {
        id: id.to_string(),
        author: Some(PostAuthor {
            handle: handle.to_string(),
            display_name: format!("{handle} (display)"),
            avatar_url: Some(format!("https://pbs.twimg.com/profile_images/{handle}.jpg")),
        }),
        text: Some(format!("Building something with @replit #{id}")),
        media: Vec::new(),
        retweeted_id: None,
        in_reply_to: None,
        is_quote: false,
    }
}

/// Turn a [`NewMention`] into a stored row with a fresh id.
pub fn make_test_mention(mention: &NewMention) -> Mention {
    Mention {
        id: Uuid::new_v4().to_string(),
        source_id: mention.source_id.clone(),
        content: mention.content.clone(),
        author_name: mention.author_name.clone(),
        author_handle: mention.author_handle.clone(),
        avatar_url: mention.avatar_url.clone(),
        media_url: mention.media_url.clone(),
        platform: mention.platform.clone(),
        status: mention.status,
        created_at: Utc::now(),
    }
}
