use cf_progress_libs::codeforces::{
    model::{RatingChange, Submission},
    CodeforcesApi,
};
use std::sync::Arc;

/// Result of one upstream call.
///
/// Transport failures and non-OK statuses both end up as `Unavailable`; the
/// cause is only logged. There is no retry here, the next cycle is the retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed<T> {
    Available(Vec<T>),
    Unavailable,
}

impl<T> Feed<T> {
    pub fn is_available(&self) -> bool {
        matches!(self, Feed::Available(_))
    }

    pub fn events(&self) -> &[T] {
        match self {
            Feed::Available(events) => events,
            Feed::Unavailable => &[],
        }
    }
}

pub struct Fetcher {
    api: Arc<dyn CodeforcesApi>,
}

impl Fetcher {
    pub fn new(api: Arc<dyn CodeforcesApi>) -> Self {
        Self { api }
    }

    pub async fn fetch_rating_history(&self, handle: &str) -> Feed<RatingChange> {
        match self.api.user_rating(handle).await {
            Ok(changes) => {
                tracing::info!(
                    "Fetched rating history of {}: {} entries.",
                    handle,
                    changes.len()
                );
                Feed::Available(changes)
            }
            Err(e) => {
                tracing::warn!("rating history of {} is unavailable: {}", handle, e);
                Feed::Unavailable
            }
        }
    }

    pub async fn fetch_submissions(&self, handle: &str) -> Feed<Submission> {
        match self.api.user_status(handle).await {
            Ok(submissions) => {
                tracing::info!(
                    "Fetched submission history of {}: {} entries.",
                    handle,
                    submissions.len()
                );
                Feed::Available(submissions)
            }
            Err(e) => {
                tracing::warn!("submission history of {} is unavailable: {}", handle, e);
                Feed::Unavailable
            }
        }
    }
}
