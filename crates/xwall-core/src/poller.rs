use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::filter::{RejectReason, Verdict, classify};
use crate::models::{NewMention, SearchSort};
use crate::session::Session;
use crate::traits::{MentionStore, PersistOutcome, SearchProvider};

/// Configuration for the polling loop.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Term to search for, e.g. `@replit`.
    pub term: String,
    /// Account whose own posts are excluded.
    pub self_handle: String,
    pub interval: Duration,
    pub batch_size: usize,
    pub sort: SearchSort,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            term: "@replit".to_string(),
            self_handle: "replit".to_string(),
            interval: Duration::from_secs(60),
            batch_size: 15,
            sort: SearchSort::Latest,
        }
    }
}

impl PollerConfig {
    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    pub fn with_self_handle(mut self, handle: impl Into<String>) -> Self {
        self.self_handle = handle.into();
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

/// Counters for a single cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleStats {
    pub seen: usize,
    pub inserted: usize,
    pub duplicates: usize,
    /// Admitted posts whose write failed.
    pub failed: usize,
    pub retweets: usize,
    pub replies: usize,
    pub quotes: usize,
    pub self_mentions: usize,
}

impl CycleStats {
    pub fn record_rejection(&mut self, reason: RejectReason) {
        match reason {
            RejectReason::Retweet => self.retweets += 1,
            RejectReason::Reply => self.replies += 1,
            RejectReason::Quote => self.quotes += 1,
            RejectReason::SelfMention => self.self_mentions += 1,
        }
    }

    /// Posts rejected by the filter.
    pub fn filtered(&self) -> usize {
        self.retweets + self.replies + self.quotes + self.self_mentions
    }

    /// Posts that were seen but neither inserted nor found to be duplicates.
    pub fn skipped(&self) -> usize {
        self.filtered() + self.failed
    }
}

/// Events emitted by the poller for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PollerEvent<'a> {
    Started {
        term: &'a str,
        self_handle: &'a str,
        interval: Duration,
        batch_size: usize,
    },
    CycleStarted {
        cycle: u64,
        term: &'a str,
    },
    SearchEmpty {
        cycle: u64,
    },
    PostRejected {
        post_id: &'a str,
        reason: RejectReason,
    },
    MentionSaved {
        id: Option<&'a str>,
        mention: &'a NewMention,
    },
    DuplicateSkipped {
        source_id: &'a str,
    },
    PersistFailed {
        source_id: &'a str,
        error: &'a AppError,
    },
    CycleCompleted {
        cycle: u64,
        stats: &'a CycleStats,
    },
    CycleAborted {
        cycle: u64,
        error: &'a str,
    },
    Sleeping {
        interval: Duration,
    },
    Stopped {
        cycles: u64,
    },
}

/// Trait for receiving poller events (decoupled logging).
pub trait PollerReporter: Send + Sync {
    fn report(&self, event: PollerEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPollerReporter;

impl PollerReporter for TracingPollerReporter {
    fn report(&self, event: PollerEvent<'_>) {
        match event {
            PollerEvent::Started {
                term,
                self_handle,
                interval,
                batch_size,
            } => {
                tracing::info!(
                    %term,
                    %self_handle,
                    interval_secs = interval.as_secs(),
                    batch_size,
                    "Monitoring mentions"
                );
            }
            PollerEvent::CycleStarted { cycle, term } => {
                tracing::info!(cycle, %term, "Searching for mentions");
            }
            PollerEvent::SearchEmpty { cycle } => {
                tracing::info!(cycle, "No tweets found in this cycle");
            }
            PollerEvent::PostRejected { post_id, reason } => {
                tracing::debug!(%post_id, %reason, "Post filtered");
            }
            PollerEvent::MentionSaved { id, mention } => {
                tracing::info!(
                    id = id.unwrap_or("-"),
                    handle = %mention.author_handle,
                    "NEW mention saved: {}",
                    mention.preview(60)
                );
            }
            PollerEvent::DuplicateSkipped { source_id } => {
                tracing::debug!(%source_id, "Duplicate skipped");
            }
            PollerEvent::PersistFailed { source_id, error } => {
                tracing::error!(%source_id, %error, "Failed to save mention");
            }
            PollerEvent::CycleCompleted { cycle, stats } => {
                tracing::info!(
                    cycle,
                    seen = stats.seen,
                    new = stats.inserted,
                    skipped = stats.skipped(),
                    duplicates = stats.duplicates,
                    failed = stats.failed,
                    "Cycle complete"
                );
            }
            PollerEvent::CycleAborted { cycle, error } => {
                tracing::error!(cycle, %error, "Unexpected error in cycle");
            }
            PollerEvent::Sleeping { interval } => {
                tracing::info!(interval_secs = interval.as_secs(), "Sleeping");
            }
            PollerEvent::Stopped { cycles } => {
                tracing::info!(cycles, "Poller stopped");
            }
        }
    }
}

/// Runs search → filter → persist cycles on a fixed interval.
pub struct MentionPoller<P, S>
where
    P: SearchProvider,
    S: MentionStore,
{
    session: Session<P>,
    store: S,
    config: PollerConfig,
}

impl<P, S> MentionPoller<P, S>
where
    P: SearchProvider,
    S: MentionStore,
{
    pub fn new(session: Session<P>, store: S, config: PollerConfig) -> Self {
        Self {
            session,
            store,
            config,
        }
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Run cycles until cancellation. Returns the number of cycles started.
    ///
    /// A panic inside a cycle is caught here and the cycle counts as empty.
    /// Cancellation is only observed between cycles and while sleeping.
    pub async fn run<PR: PollerReporter>(&self, cancel_token: CancellationToken, reporter: &PR) -> u64 {
        reporter.report(PollerEvent::Started {
            term: &self.config.term,
            self_handle: &self.config.self_handle,
            interval: self.config.interval,
            batch_size: self.config.batch_size,
        });

        let mut cycle = 0u64;
        loop {
            if cancel_token.is_cancelled() {
                break;
            }
            cycle += 1;

            let stats = match AssertUnwindSafe(self.run_cycle(cycle, reporter))
                .catch_unwind()
                .await
            {
                Ok(stats) => stats,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    reporter.report(PollerEvent::CycleAborted {
                        cycle,
                        error: &message,
                    });
                    CycleStats::default()
                }
            };

            reporter.report(PollerEvent::CycleCompleted {
                cycle,
                stats: &stats,
            });
            reporter.report(PollerEvent::Sleeping {
                interval: self.config.interval,
            });

            tokio::select! {
                () = tokio::time::sleep(self.config.interval) => {}
                () = cancel_token.cancelled() => break,
            }
        }

        reporter.report(PollerEvent::Stopped { cycles: cycle });
        cycle
    }

    /// One search → filter → persist pass. Posts are handled sequentially;
    /// a failed write is counted and the batch continues.
    pub async fn run_cycle<PR: PollerReporter>(&self, cycle: u64, reporter: &PR) -> CycleStats {
        reporter.report(PollerEvent::CycleStarted {
            cycle,
            term: &self.config.term,
        });

        let mut stats = CycleStats::default();

        let posts = match self
            .session
            .search(&self.config.term, self.config.sort, self.config.batch_size)
            .await
        {
            Some(posts) if !posts.is_empty() => posts,
            _ => {
                reporter.report(PollerEvent::SearchEmpty { cycle });
                return stats;
            }
        };

        for post in &posts {
            stats.seen += 1;

            if let Verdict::Reject(reason) = classify(post, &self.config.self_handle) {
                stats.record_rejection(reason);
                reporter.report(PollerEvent::PostRejected {
                    post_id: &post.id,
                    reason,
                });
                continue;
            }

            let mention = NewMention::from_post(post);
            match self.store.insert(&mention).await {
                Ok(PersistOutcome::Inserted(id)) => {
                    stats.inserted += 1;
                    reporter.report(PollerEvent::MentionSaved {
                        id: id.as_deref(),
                        mention: &mention,
                    });
                }
                Ok(PersistOutcome::Duplicate) => {
                    stats.duplicates += 1;
                    reporter.report(PollerEvent::DuplicateSkipped {
                        source_id: &mention.source_id,
                    });
                }
                Err(e) => {
                    stats.failed += 1;
                    reporter.report(PollerEvent::PersistFailed {
                        source_id: &mention.source_id,
                        error: &e,
                    });
                }
            }
        }

        stats
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "cycle panicked".to_string()
    }
}
