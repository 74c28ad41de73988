use crate::models::{RawPost, SearchSort};
use crate::retry::{RetryPolicy, retry};
use crate::traits::SearchProvider;

/// Authenticated search handle. Every provider call goes through the
/// retry executor.
pub struct Session<P: SearchProvider> {
    provider: P,
    retry_policy: RetryPolicy,
}

impl<P: SearchProvider> Session<P> {
    pub fn new(provider: P, retry_policy: RetryPolicy) -> Self {
        Self {
            provider,
            retry_policy,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Search for up to `limit` posts matching `term`.
    ///
    /// Returns `None` when every attempt failed.
    pub async fn search(&self, term: &str, sort: SearchSort, limit: usize) -> Option<Vec<RawPost>> {
        retry(&self.retry_policy, "Tweet search", || {
            self.provider.search(term, sort, limit)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::AppError;
    use crate::testutil::{MockSearchProvider, make_post};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn search_passes_query_through() {
        let provider = MockSearchProvider::with_batches(vec![Ok(vec![make_post("1", "alice")])]);
        let session = Session::new(provider.clone(), fast_policy());

        let posts = session.search("@replit", SearchSort::Latest, 15).await.unwrap();

        assert_eq!(posts.len(), 1);
        let queries = provider.queries.lock().unwrap();
        assert_eq!(queries.as_slice(), &[("@replit".to_string(), SearchSort::Latest, 15)]);
    }

    #[tokio::test]
    async fn search_recovers_from_transient_failure() {
        let provider = MockSearchProvider::with_batches(vec![
            Err(AppError::NetworkError("reset".into())),
            Ok(vec![make_post("1", "alice"), make_post("2", "bob")]),
        ]);
        let session = Session::new(provider.clone(), fast_policy());

        let posts = session.search("@replit", SearchSort::Latest, 15).await.unwrap();

        assert_eq!(posts.len(), 2);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn search_yields_none_after_exhaustion() {
        let provider = MockSearchProvider::with_batches(vec![
            Err(AppError::RateLimitExceeded),
            Err(AppError::RateLimitExceeded),
            Err(AppError::RateLimitExceeded),
            Ok(vec![make_post("1", "alice")]),
        ]);
        let session = Session::new(provider.clone(), fast_policy());

        assert!(session.search("@replit", SearchSort::Latest, 15).await.is_none());
        assert_eq!(provider.call_count(), 3);
    }
}
