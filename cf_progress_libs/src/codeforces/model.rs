use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Verdict string the upstream uses for a fully correct submission.
pub const ACCEPTED_VERDICT: &str = "OK";

/// Problem id used when a problem does not belong to any contest.
pub const NO_CONTEST: &str = "noContest";

/// Envelope every Codeforces API method responds with.
#[derive(Serialize, Deserialize, Debug)]
pub struct CodeforcesResponse<T> {
    pub status: String,
    pub comment: Option<String>,
    pub result: Option<T>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RatingChange {
    pub contest_id: i64,
    pub contest_name: String,
    #[serde(default)]
    pub handle: String,
    pub rank: i64,
    pub rating_update_time_seconds: i64,
    pub old_rating: i32,
    pub new_rating: i32,
}

impl RatingChange {
    pub fn rating_change(&self) -> i32 {
        self.new_rating - self.old_rating
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        epoch_to_utc(self.rating_update_time_seconds)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub contest_id: Option<i64>,
    pub index: String,
    pub name: String,
    pub rating: Option<i32>,
}

impl Problem {
    /// Identifier of the form `<contestId>_<index>`.
    pub fn problem_id(&self) -> String {
        match self.contest_id {
            Some(contest_id) => format!("{}_{}", contest_id, self.index),
            None => format!("{}_{}", NO_CONTEST, self.index),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: i64,
    pub creation_time_seconds: i64,
    pub problem: Problem,
    // absent while the submission is still being judged
    pub verdict: Option<String>,
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        self.verdict.as_deref() == Some(ACCEPTED_VERDICT)
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        epoch_to_utc(self.creation_time_seconds)
    }
}

fn epoch_to_utc(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or_else(|| DateTime::<Utc>::MIN_UTC)
}
