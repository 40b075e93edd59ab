use chrono::{DateTime, FixedOffset};
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};

use crate::quiz::QuestionKey;
use crate::reminders::ReminderSet;

pub type MyDialogue = Dialogue<State, InMemStorage<State>>;

/// Conversation state, one variant per step. Each variant carries exactly the
/// draft fields that are valid at that step, so a handler can never observe a
/// half-filled draft. Conversation state is transient by design: a restart
/// drops every in-flight draft while committed quizzes and submissions stay
/// in the database.
#[derive(Clone, Default)]
pub enum State {
    #[default]
    Idle,

    // participant registration
    AwaitingFullName,
    ConfirmingFullName {
        full_name: String,
    },

    // admin roster management (owner only)
    AddingAdmin,
    RemovingAdmin,

    // quiz authoring
    AwaitingTitle,
    ConfirmingTitle {
        title: String,
    },
    AwaitingQuestions {
        title: String,
    },
    ConfirmingQuestions {
        title: String,
        questions: Vec<QuestionKey>,
    },
    AwaitingDeadline {
        title: String,
        questions: Vec<QuestionKey>,
    },
    ConfirmingQuiz {
        title: String,
        questions: Vec<QuestionKey>,
        deadline: DateTime<FixedOffset>,
    },

    // quiz taking
    AwaitingCode,
    AwaitingAnswers {
        quiz_id: i64,
        deadline: DateTime<FixedOffset>,
        reminders: ReminderSet,
    },
    ConfirmingAnswers {
        quiz_id: i64,
        deadline: DateTime<FixedOffset>,
        reminders: ReminderSet,
        answers: Vec<(u32, String)>,
    },
}

impl State {
    /// The reminder group owned by the current step, if any. Consulted on
    /// superseding transitions so no scheduled send outlives the attempt.
    pub fn reminder_set(&self) -> Option<&ReminderSet> {
        match self {
            State::AwaitingAnswers { reminders, .. }
            | State::ConfirmingAnswers { reminders, .. } => Some(reminders),
            _ => None,
        }
    }
}
