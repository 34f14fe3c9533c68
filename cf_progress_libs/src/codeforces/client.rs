use crate::codeforces::model::*;
use async_trait::async_trait;
use reqwest::{self, Client, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

type Result<T> = std::result::Result<T, CodeforcesError>;

#[derive(Debug, Error)]
pub enum CodeforcesError {
    #[error("failed to request to codeforces api")]
    RequestError(#[from] reqwest::Error),
    #[error("failed to deserialize JSON data")]
    DeserializeError(#[from] serde_json::Error),
    #[error("invalid codeforces api url given")]
    InvalidUrlError(#[from] url::ParseError),
    #[error("codeforces api returned status {status}: {comment}")]
    FailedStatus { status: String, comment: String },
}

/// Read-only access to the two user history methods of the Codeforces API.
///
/// Both methods return the complete history of the handle on every call.
#[async_trait]
pub trait CodeforcesApi: Send + Sync {
    async fn user_rating(&self, handle: &str) -> Result<Vec<RatingChange>>;
    async fn user_status(&self, handle: &str) -> Result<Vec<Submission>>;
}

pub struct CodeforcesClient {
    rating_url: Url,
    status_url: Url,
    client: Client,
}

impl CodeforcesClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let rating_url = base_url.join("user.rating")?;
        let status_url = base_url.join("user.status")?;

        let client = Client::builder()
            .gzip(true)
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(CodeforcesClient {
            rating_url,
            status_url,
            client,
        })
    }

    async fn get<T: DeserializeOwned>(&self, url: &Url, handle: &str) -> Result<T> {
        let res = self
            .client
            .get(url.clone())
            .query(&[("handle", handle)])
            .send()
            .await?;

        // unknown handles come back as HTTP 400 with a FAILED envelope, so the
        // body is parsed regardless of the status code
        let http_status = res.status();
        let body = res.bytes().await?;
        let envelope: CodeforcesResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(
                    "undecodable response from {} with http status {}",
                    url,
                    http_status
                );
                return Err(CodeforcesError::DeserializeError(e));
            }
        };

        match (envelope.status.as_str(), envelope.result) {
            ("OK", Some(result)) => Ok(result),
            (status, _) => Err(CodeforcesError::FailedStatus {
                status: status.to_string(),
                comment: envelope.comment.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
impl CodeforcesApi for CodeforcesClient {
    async fn user_rating(&self, handle: &str) -> Result<Vec<RatingChange>> {
        self.get(&self.rating_url, handle).await
    }

    async fn user_status(&self, handle: &str) -> Result<Vec<Submission>> {
        self.get(&self.status_url, handle).await
    }
}
