use crate::types::tables::SubmissionRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardestProblem {
    pub name: String,
    pub rating: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemSolvingSummary {
    pub total_problems_solved: usize,
    pub most_difficult_problem: Option<HardestProblem>,
    pub average_rating: f64,
    pub average_problems_per_day: f64,
    /// Solved problems per rating rounded down to the hundred. Unrated problems are left out.
    pub problem_rating_buckets: BTreeMap<i32, usize>,
    /// Accepted submissions per UTC day (`YYYY-MM-DD`), repeats included.
    pub submission_heatmap: BTreeMap<String, usize>,
}

/// Floors `rating` to its bucket, e.g. `1499` -> `1400`.
pub fn rating_bucket(rating: i32) -> i32 {
    rating.div_euclid(100) * 100
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Aggregates accepted submissions made in `[since, now]`, oldest first.
///
/// Each problem counts once, at its first accepted submission.
pub fn summarize(
    submissions: &[SubmissionRecord],
    since: DateTime<Utc>,
    now: DateTime<Utc>,
) -> ProblemSolvingSummary {
    let mut solved: HashSet<&str> = HashSet::new();
    let mut total_rating: i64 = 0;
    let mut hardest: Option<HardestProblem> = None;
    let mut buckets: BTreeMap<i32, usize> = BTreeMap::new();
    let mut heatmap: BTreeMap<String, usize> = BTreeMap::new();

    for submission in submissions.iter() {
        if solved.insert(submission.problem_id.as_str()) {
            total_rating += i64::from(submission.problem_rating);

            if hardest
                .as_ref()
                .map_or(true, |hardest| submission.problem_rating > hardest.rating)
            {
                hardest = Some(HardestProblem {
                    name: submission.problem_name.clone(),
                    rating: submission.problem_rating,
                });
            }

            let bucket = rating_bucket(submission.problem_rating);
            if bucket > 0 {
                *buckets.entry(bucket).or_insert(0) += 1;
            }
        }

        let day = submission.submission_time.format("%Y-%m-%d").to_string();
        *heatmap.entry(day).or_insert(0) += 1;
    }

    let total = solved.len();
    let average_rating = if total > 0 {
        round2(total_rating as f64 / total as f64)
    } else {
        0.0
    };
    let days = (now - since).num_seconds() as f64 / 86_400.0;
    let average_problems_per_day = if days > 0.0 {
        round2(total as f64 / days)
    } else {
        0.0
    };

    ProblemSolvingSummary {
        total_problems_solved: total,
        most_difficult_problem: hardest,
        average_rating,
        average_problems_per_day,
        problem_rating_buckets: buckets,
        submission_heatmap: heatmap,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::Duration;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn record(id: i64, problem_id: &str, rating: i32, time: &str) -> SubmissionRecord {
        SubmissionRecord {
            id,
            student_id: 1,
            submission_id: id,
            problem_id: problem_id.to_string(),
            problem_name: format!("Problem {}", problem_id),
            problem_rating: rating,
            verdict: String::from("OK"),
            submission_time: at(time),
            created_at: at(time),
        }
    }

    #[test]
    fn test_rating_bucket() {
        assert_eq!(rating_bucket(0), 0);
        assert_eq!(rating_bucket(800), 800);
        assert_eq!(rating_bucket(1499), 1400);
        assert_eq!(rating_bucket(3500), 3500);
    }

    #[test]
    fn test_summarize() {
        let now = at("2024-01-11T00:00:00Z");
        let since = now - Duration::days(10);
        let submissions = vec![
            record(1, "1_A", 800, "2024-01-02T10:00:00Z"),
            record(2, "1_A", 800, "2024-01-02T11:00:00Z"),
            record(3, "2_C", 1450, "2024-01-03T09:00:00Z"),
            record(4, "3_B", 1400, "2024-01-03T21:00:00Z"),
            record(5, "noContest_Z", 0, "2024-01-05T00:00:00Z"),
        ];

        let summary = summarize(&submissions, since, now);

        assert_eq!(summary.total_problems_solved, 4);
        assert_eq!(
            summary.most_difficult_problem,
            Some(HardestProblem {
                name: String::from("Problem 2_C"),
                rating: 1450
            })
        );
        assert_eq!(summary.average_rating, 912.5);
        assert_eq!(summary.average_problems_per_day, 0.4);
        assert_eq!(
            summary.problem_rating_buckets,
            BTreeMap::from([(800, 1), (1400, 2)])
        );
        assert_eq!(summary.submission_heatmap.get("2024-01-02"), Some(&2));
        assert_eq!(summary.submission_heatmap.get("2024-01-03"), Some(&2));
        assert_eq!(summary.submission_heatmap.get("2024-01-05"), Some(&1));
    }

    #[test]
    fn test_summarize_nothing() {
        let now = at("2024-01-11T00:00:00Z");
        let summary = summarize(&[], now - Duration::days(7), now);

        assert_eq!(summary.total_problems_solved, 0);
        assert_eq!(summary.most_difficult_problem, None);
        assert_eq!(summary.average_rating, 0.0);
        assert_eq!(summary.average_problems_per_day, 0.0);
        assert!(summary.problem_rating_buckets.is_empty());
    }

    #[test]
    fn test_serialize_in_camel_case() {
        let now = at("2024-01-11T00:00:00Z");
        let summary = summarize(&[], now - Duration::days(7), now);
        let value = serde_json::to_value(&summary).unwrap();

        assert!(value.get("totalProblemsSolved").is_some());
        assert!(value.get("submissionHeatmap").is_some());
    }
}
