pub mod deadline;
pub mod normalize;
pub mod parse;
pub mod score;

/// One row of a quiz's answer key: question number, canonical answer and the
/// score awarded for matching it.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionKey {
    pub number: u32,
    pub answer: String,
    pub weight: f64,
}

/// Render an answer key the way it is previewed to the quiz author.
pub fn render_key(questions: &[QuestionKey]) -> String {
    questions
        .iter()
        .map(|q| format!("{}. {} (+{})", q.number, q.answer, q.weight))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_preview_keeps_entry_order_and_trims_weights() {
        let questions = vec![
            QuestionKey { number: 2, answer: "0.75".into(), weight: 1.0 },
            QuestionKey { number: 1, answer: "A".into(), weight: 2.5 },
        ];
        assert_eq!(render_key(&questions), "2. 0.75 (+1)\n1. A (+2.5)");
    }
}
