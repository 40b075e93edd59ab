use teloxide::dispatching::dialogue::InMemStorageError;

pub type HandlerResult = Result<(), BotError>;

/// Errors that abort the current update. Recoverable input problems
/// ([`FormatError`], [`EligibilityError`]) are handled inside the flow
/// handlers and never reach the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("malformed timestamp in the store: {0}")]
    BadTimestamp(#[from] chrono::ParseError),

    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),

    #[error("dialogue storage error: {0}")]
    Storage(#[from] InMemStorageError),
}

/// A line of user input that does not match the expected grammar. The
/// offending line is kept verbatim so the re-prompt can show it back.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reason} in line:\n{line}")]
pub struct FormatError {
    pub line: String,
    pub reason: FormatReason,
}

impl FormatError {
    pub fn new(line: &str, reason: FormatReason) -> Self {
        Self { line: line.to_owned(), reason }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FormatReason {
    #[error("NOT ENOUGH FIELDS")]
    TooFewFields,

    #[error("EXPECTED EXACTLY \"NUMBER ANSWER\"")]
    WrongFieldCount,

    #[error("THE QUESTION NUMBER MUST BE A POSITIVE INTEGER")]
    BadQuestionNumber,

    #[error("THE SCORE MUST BE A POSITIVE MULTIPLE OF 0.5")]
    BadScore,

    #[error("THE ANSWER EXCEEDS THE ALLOWED LENGTH")]
    AnswerTooLong,

    #[error("MALFORMED FRACTION")]
    BadFraction,
}

/// Why a quiz-taking attempt cannot proceed. Terminal for the attempt: the
/// conversation returns to idle with an explanation, no retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum EligibilityError {
    #[error("unknown or inactive access code")]
    UnknownCode,

    #[error("a submission already exists for this quiz")]
    AlreadySubmitted,

    #[error("the deadline has already passed")]
    DeadlinePassed,
}
