use std::collections::HashMap;

use crate::error::{FormatError, FormatReason};

use super::normalize::normalize_token;
use super::QuestionKey;

/// Parse an authoring block: one question per line, `NUMBER ANSWER SCORE`.
/// The answer is everything between the first and the last field, so
/// multi-word answers survive. Any bad line aborts the whole block.
pub fn parse_answer_key(block: &str) -> Result<Vec<QuestionKey>, FormatError> {
    let mut parsed = Vec::new();
    for line in non_empty_lines(block) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(FormatError::new(line, FormatReason::TooFewFields));
        }
        let number = parse_number(fields[0])
            .ok_or_else(|| FormatError::new(line, FormatReason::BadQuestionNumber))?;
        let weight = parse_weight(fields[fields.len() - 1])
            .ok_or_else(|| FormatError::new(line, FormatReason::BadScore))?;
        let answer = fields[1..fields.len() - 1].join(" ");
        let answer =
            normalize_token(&answer).map_err(|reason| FormatError::new(line, reason))?;
        parsed.push(QuestionKey { number, answer, weight });
    }
    Ok(parsed)
}

/// Parse a taking block: exactly `NUMBER ANSWER` per line.
pub fn parse_submission(block: &str) -> Result<Vec<(u32, String)>, FormatError> {
    let mut parsed = Vec::new();
    for line in non_empty_lines(block) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(FormatError::new(line, FormatReason::WrongFieldCount));
        }
        let number = parse_number(fields[0])
            .ok_or_else(|| FormatError::new(line, FormatReason::BadQuestionNumber))?;
        let answer =
            normalize_token(fields[1]).map_err(|reason| FormatError::new(line, reason))?;
        parsed.push((number, answer));
    }
    Ok(parsed)
}

/// Collapse duplicate question numbers: the last occurrence wins, the first
/// occurrence keeps its position. Duplicates are accepted by the parsers, so
/// the authoring flow applies this before previewing or storing a key.
pub fn dedupe_last_wins(parsed: Vec<QuestionKey>) -> Vec<QuestionKey> {
    let mut positions: HashMap<u32, usize> = HashMap::new();
    let mut deduped: Vec<QuestionKey> = Vec::with_capacity(parsed.len());
    for question in parsed {
        match positions.get(&question.number) {
            Some(&at) => deduped[at] = question,
            None => {
                positions.insert(question.number, deduped.len());
                deduped.push(question);
            }
        }
    }
    deduped
}

fn non_empty_lines(block: &str) -> impl Iterator<Item = &str> {
    block.lines().map(str::trim).filter(|line| !line.is_empty())
}

fn parse_number(field: &str) -> Option<u32> {
    field.parse::<u32>().ok().filter(|number| *number >= 1)
}

fn parse_weight(field: &str) -> Option<f64> {
    let weight: f64 = field.parse().ok()?;
    // positive, in half-point steps; halves are exact in binary floats
    (weight > 0.0 && (weight * 2.0).fract() == 0.0).then_some(weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authoring_lines_are_parsed_with_normalized_answers() {
        let parsed = parse_answer_key("1 A 1\n2 3/4 0.5\n3 -2/3 1.5").unwrap();
        assert_eq!(
            parsed,
            vec![
                QuestionKey { number: 1, answer: "A".into(), weight: 1.0 },
                QuestionKey { number: 2, answer: "0.75".into(), weight: 0.5 },
                QuestionKey { number: 3, answer: "-0.667".into(), weight: 1.5 },
            ]
        );
    }

    #[test]
    fn multi_word_answers_keep_everything_between_number_and_score() {
        let parsed = parse_answer_key("4 a b 2").unwrap();
        assert_eq!(parsed[0].answer, "a b");
        assert_eq!(parsed[0].weight, 2.0);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let parsed = parse_answer_key("1 A 1\n\n   \n2 B 1").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn a_bad_line_aborts_the_block_and_is_reported_verbatim() {
        let err = parse_answer_key("1 A 1\n2 B\n3 C 1").unwrap_err();
        assert_eq!(err.line, "2 B");
        assert_eq!(err.reason, FormatReason::TooFewFields);
    }

    #[test]
    fn scores_must_be_positive_multiples_of_half() {
        assert!(parse_answer_key("1 A 2.5").is_ok());
        assert!(parse_answer_key("1 A 3").is_ok());
        let bad = ["1 A 0", "1 A -1", "1 A 0.3", "1 A x"];
        for block in bad {
            let err = parse_answer_key(block).unwrap_err();
            assert_eq!(err.reason, FormatReason::BadScore, "{block}");
        }
    }

    #[test]
    fn question_numbers_must_be_positive_integers() {
        for block in ["0 A 1", "-1 A 1", "x A 1", "1.5 A 1"] {
            let err = parse_answer_key(block).unwrap_err();
            assert_eq!(err.reason, FormatReason::BadQuestionNumber, "{block}");
        }
    }

    #[test]
    fn taking_lines_need_exactly_two_fields() {
        let parsed = parse_submission("1 A\n2 2/3").unwrap();
        assert_eq!(parsed, vec![(1, "A".into()), (2, "0.667".into())]);

        let err = parse_submission("1 A extra").unwrap_err();
        assert_eq!(err.reason, FormatReason::WrongFieldCount);
        assert_eq!(err.line, "1 A extra");

        let err = parse_submission("1").unwrap_err();
        assert_eq!(err.reason, FormatReason::WrongFieldCount);
    }

    #[test]
    fn overlong_answers_are_rejected_with_the_line() {
        let err = parse_submission("1 123456").unwrap_err();
        assert_eq!(err.reason, FormatReason::AnswerTooLong);
        assert_eq!(err.line, "1 123456");
    }

    #[test]
    fn duplicate_numbers_survive_parsing() {
        let parsed = parse_answer_key("1 A 1\n1 B 2").unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn dedupe_keeps_the_last_value_at_the_first_position() {
        let parsed = parse_answer_key("1 A 1\n2 B 1\n1 C 3").unwrap();
        let deduped = dedupe_last_wins(parsed);
        assert_eq!(
            deduped,
            vec![
                QuestionKey { number: 1, answer: "C".into(), weight: 3.0 },
                QuestionKey { number: 2, answer: "B".into(), weight: 1.0 },
            ]
        );
    }
}
