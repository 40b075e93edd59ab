use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};

use super::QuestionKey;

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub number: u32,
    /// `None` when the participant left the question unanswered.
    pub submitted: Option<String>,
    pub correct: bool,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub per_question: Vec<QuestionResult>,
    pub solved: usize,
    pub total_score: f64,
    pub max_score: f64,
}

/// One stored submission joined with its participant, as retrieved.
#[derive(Debug, Clone)]
pub struct SubmissionRow {
    pub user_id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub submitted_at: DateTime<FixedOffset>,
    pub answer_text: String,
}

#[derive(Debug, Clone)]
pub struct ParticipantScore {
    pub user_id: i64,
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub submitted_at: DateTime<FixedOffset>,
    pub solved: usize,
    pub question_count: usize,
    pub total_score: f64,
    pub max_score: f64,
}

/// Compare a submitted answer set against the key. Equality is exact string
/// comparison after lower-casing and trimming both sides; entry-time
/// normalization is the only point where different spellings reconcile.
pub fn score(key: &[QuestionKey], submitted: &HashMap<u32, String>) -> ScoreReport {
    let mut per_question = Vec::with_capacity(key.len());
    let mut solved = 0;
    let mut total_score = 0.0;
    let mut max_score = 0.0;

    for question in key {
        max_score += question.weight;
        let answer = submitted.get(&question.number);
        let correct = answer.is_some_and(|a| canonical(a) == canonical(&question.answer));
        if correct {
            solved += 1;
            total_score += question.weight;
        }
        per_question.push(QuestionResult {
            number: question.number,
            submitted: answer.cloned(),
            correct,
            weight: question.weight,
        });
    }

    ScoreReport { per_question, solved, total_score, max_score }
}

/// Build the number → answer map from a stored answer block. Lenient on
/// purpose: blocks were validated at entry, so a malformed line here is
/// skipped rather than failing the whole results view. A later line for the
/// same number overwrites an earlier one.
pub fn answers_map(raw: &str) -> HashMap<u32, String> {
    let mut map = HashMap::new();
    for line in raw.lines() {
        let line = line.trim();
        let Some((number, rest)) = line.split_once(char::is_whitespace) else {
            continue;
        };
        let Ok(number) = number.parse::<u32>() else {
            continue;
        };
        map.insert(number, rest.trim().to_owned());
    }
    map
}

/// Score every participant's latest submission and rank them by total score,
/// descending. The sort is stable: ties keep the retrieval order. Multiple
/// rows per participant should not happen (commit enforces one), but when
/// they do, only the latest instant counts.
pub fn rank_submissions(key: &[QuestionKey], rows: &[SubmissionRow]) -> Vec<ParticipantScore> {
    let mut order: Vec<i64> = Vec::new();
    let mut latest: HashMap<i64, &SubmissionRow> = HashMap::new();
    for row in rows {
        match latest.get(&row.user_id) {
            Some(kept) if kept.submitted_at >= row.submitted_at => {}
            Some(_) => {
                latest.insert(row.user_id, row);
            }
            None => {
                latest.insert(row.user_id, row);
                order.push(row.user_id);
            }
        }
    }

    let mut ranked: Vec<ParticipantScore> = order
        .into_iter()
        .map(|user_id| {
            let row = latest[&user_id];
            let report = score(key, &answers_map(&row.answer_text));
            ParticipantScore {
                user_id: row.user_id,
                full_name: row.full_name.clone(),
                username: row.username.clone(),
                submitted_at: row.submitted_at,
                solved: report.solved,
                question_count: key.len(),
                total_score: report.total_score,
                max_score: report.max_score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

fn canonical(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::normalize::normalize_token;
    use chrono::TimeZone;

    fn key() -> Vec<QuestionKey> {
        vec![
            QuestionKey { number: 1, answer: "a".into(), weight: 1.0 },
            QuestionKey { number: 2, answer: "0.667".into(), weight: 2.5 },
        ]
    }

    fn submitted(pairs: &[(u32, &str)]) -> HashMap<u32, String> {
        pairs.iter().map(|(n, a)| (*n, (*a).to_owned())).collect()
    }

    #[test]
    fn normalized_fraction_matches_the_stored_decimal() {
        let answers = submitted(&[(1, "A"), (2, &normalize_token("2/3").unwrap())]);
        let report = score(&key(), &answers);
        assert_eq!(report.solved, 2);
        assert_eq!(report.total_score, 3.5);
        assert_eq!(report.max_score, 3.5);
    }

    #[test]
    fn comparison_is_case_insensitive_but_not_numeric() {
        let answers = submitted(&[(1, "A"), (2, "0.6667")]);
        let report = score(&key(), &answers);
        assert_eq!(report.solved, 1);
        assert_eq!(report.total_score, 1.0);
    }

    #[test]
    fn unanswered_questions_count_as_wrong_and_keep_max_score() {
        let answers = submitted(&[(1, "a")]);
        let report = score(&key(), &answers);
        assert_eq!(report.solved, 1);
        assert_eq!(report.max_score, 3.5);
        let missing = &report.per_question[1];
        assert_eq!(missing.submitted, None);
        assert!(!missing.correct);
    }

    #[test]
    fn totals_do_not_depend_on_key_order() {
        let answers = submitted(&[(1, "a"), (2, "0.667")]);
        let forward = score(&key(), &answers);
        let mut reversed_key = key();
        reversed_key.reverse();
        let backward = score(&reversed_key, &answers);
        assert_eq!(forward.total_score, backward.total_score);
        assert_eq!(forward.solved, backward.solved);
        assert_eq!(forward.max_score, backward.max_score);
    }

    #[test]
    fn answers_map_is_lenient_and_last_write_wins() {
        let map = answers_map("1 a\nnot a line\n2 b c\n1 d\n");
        assert_eq!(map.get(&1).map(String::as_str), Some("d"));
        assert_eq!(map.get(&2).map(String::as_str), Some("b c"));
        assert_eq!(map.len(), 2);
    }

    fn row(user_id: i64, hour: u32, text: &str) -> SubmissionRow {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap();
        SubmissionRow {
            user_id,
            full_name: None,
            username: None,
            submitted_at: tz.with_ymd_and_hms(2025, 7, 7, hour, 0, 0).unwrap(),
            answer_text: text.to_owned(),
        }
    }

    #[test]
    fn only_the_latest_submission_per_participant_counts() {
        let rows = vec![row(10, 9, "1 a\n2 0.667"), row(10, 11, "1 a")];
        let ranked = rank_submissions(&key(), &rows);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].total_score, 1.0);
        assert_eq!(ranked[0].submitted_at.format("%H").to_string(), "11");
    }

    #[test]
    fn ranking_is_descending_and_ties_keep_retrieval_order() {
        let rows = vec![
            row(1, 9, "1 x"),
            row(2, 9, "1 a\n2 0.667"),
            row(3, 9, "1 z"),
        ];
        let ranked = rank_submissions(&key(), &rows);
        let ids: Vec<i64> = ranked.iter().map(|r| r.user_id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
    }
}
