use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::config::Config;
use crate::db::{Db, QuizRef};
use crate::error::{BotError, EligibilityError, HandlerResult};
use crate::quiz::parse::parse_submission;
use crate::quiz::score::{score, ScoreReport};
use crate::reminders;
use crate::state::{MyDialogue, State};

const ANSWERS_FORMAT_HELP: &str = "✍️ Send your answers line by line as:\n\n\
NUMBER ANSWER\n\
Each answer must follow the rules and be at most 5 characters long (6 with a minus).\n\n\
✅ ACCEPTED ANSWERS:\n\
• A, B, C\n\
• integers (for example: 1, -12, 12345)\n\
• simple fractions (for example: 3/4, -2/3)\n\
• decimals (for example: 0.667, -0.75, 123.4)\n\n\
✅ EXAMPLES:\n\
1 A\n\
2 3/4\n\
3 -2/3\n\
4 -0.75\n\
5 0.667\n\
6 12345\n\
7 123.4\n\
8 -12.3\n\
9 -1.5\n\
10 B";

const CB_SUBMIT: &str = "taking_submit";
const CB_RETRY: &str = "taking_retry";
const CB_CANCEL: &str = "taking_cancel";

const CANCELLED_TEXT: &str =
    "❌ Quiz attempt cancelled. Start again from the main menu whenever you like.";

pub async fn begin(bot: Bot, dialogue: MyDialogue, msg: Message) -> HandlerResult {
    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
        "❌ Cancel",
        CB_CANCEL,
    )]]);
    bot.send_message(msg.chat.id, "🔐 Send the quiz access code:")
        .reply_markup(keyboard)
        .await?;
    dialogue.update(State::AwaitingCode).await?;
    Ok(())
}

/// Code entry. Every rejection here is terminal: the conversation goes back
/// to idle with an explanation, no retry loop at this step.
pub async fn receive_code(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    msg: Message,
) -> HandlerResult {
    let Some(user) = msg.from() else { return Ok(()) };
    let user_id = user.id.0 as i64;
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, "Send the code as plain text.").await?;
        return Ok(());
    };
    let code = text.trim().to_uppercase();

    let quiz = match eligibility(&db, &config, user_id, &code).await? {
        Ok(quiz) => quiz,
        Err(reason) => {
            log::info!("code entry rejected for {user_id}: {reason}");
            bot.send_message(msg.chat.id, rejection_text(reason)).await?;
            dialogue.exit().await?;
            return Ok(());
        }
    };

    bot.send_message(msg.chat.id, ANSWERS_FORMAT_HELP).await?;
    let reminders = reminders::schedule(
        bot.clone(),
        db.clone(),
        dialogue.clone(),
        user_id,
        quiz.quiz_id,
        quiz.deadline,
        config.now(),
    );
    dialogue
        .update(State::AwaitingAnswers { quiz_id: quiz.quiz_id, deadline: quiz.deadline, reminders })
        .await?;
    Ok(())
}

async fn eligibility(
    db: &Db,
    config: &Config,
    user_id: i64,
    code: &str,
) -> Result<Result<QuizRef, EligibilityError>, BotError> {
    let Some(quiz) = db.find_quiz_by_code(code).await? else {
        return Ok(Err(EligibilityError::UnknownCode));
    };
    if db.has_submission(user_id, quiz.quiz_id).await? {
        return Ok(Err(EligibilityError::AlreadySubmitted));
    }
    if config.now() > quiz.deadline {
        return Ok(Err(EligibilityError::DeadlinePassed));
    }
    Ok(Ok(quiz))
}

fn rejection_text(reason: EligibilityError) -> &'static str {
    match reason {
        EligibilityError::UnknownCode => "❌ Unknown code. Check it and start over.",
        EligibilityError::AlreadySubmitted => {
            "⚠️ You have already taken this quiz. Resubmitting is not allowed."
        }
        EligibilityError::DeadlinePassed => {
            "⏰ The submission deadline has passed. The quiz can no longer be started."
        }
    }
}

pub async fn receive_answers(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    (quiz_id, deadline, reminders): (i64, DateTime<FixedOffset>, reminders::ReminderSet),
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, ANSWERS_FORMAT_HELP).await?;
        return Ok(());
    };

    let answers = match parse_submission(text) {
        Ok(parsed) if !parsed.is_empty() => parsed,
        Ok(_) => {
            bot.send_message(msg.chat.id, ANSWERS_FORMAT_HELP).await?;
            return Ok(());
        }
        Err(err) => {
            bot.send_message(msg.chat.id, format!("❌ {err}\n\n{ANSWERS_FORMAT_HELP}")).await?;
            return Ok(());
        }
    };

    let preview: Vec<String> = answers.iter().map(|(n, a)| format!("{n}. {a}")).collect();
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("✅ Submit", CB_SUBMIT),
            InlineKeyboardButton::callback("🔁 Enter again", CB_RETRY),
        ],
        vec![InlineKeyboardButton::callback("❌ Cancel", CB_CANCEL)],
    ]);
    bot.send_message(
        msg.chat.id,
        format!("Here is what I got:\n\n{}\n\nSubmit?", preview.join("\n")),
    )
    .reply_markup(keyboard)
    .await?;
    dialogue
        .update(State::ConfirmingAnswers { quiz_id, deadline, reminders, answers })
        .await?;
    Ok(())
}

pub async fn cancel_at_code(bot: Bot, dialogue: MyDialogue, q: CallbackQuery) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    if q.data.as_deref() != Some(CB_CANCEL) {
        return Ok(());
    }
    let Some(message) = q.message.as_ref() else { return Ok(()) };
    bot.edit_message_text(message.chat.id, message.id, CANCELLED_TEXT).await?;
    dialogue.exit().await?;
    Ok(())
}

pub async fn cancel_at_answers(
    bot: Bot,
    dialogue: MyDialogue,
    q: CallbackQuery,
    (_quiz_id, _deadline, reminders): (i64, DateTime<FixedOffset>, reminders::ReminderSet),
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    if q.data.as_deref() != Some(CB_CANCEL) {
        return Ok(());
    }
    let Some(message) = q.message.as_ref() else { return Ok(()) };
    reminders.cancel();
    bot.edit_message_text(message.chat.id, message.id, CANCELLED_TEXT).await?;
    dialogue.exit().await?;
    Ok(())
}

/// Confirm step. The deadline and the single-submission rule are both
/// re-checked against current persisted state before the commit, so a second
/// device racing through the same attempt cannot double-submit.
pub async fn confirm_decision(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    q: CallbackQuery,
    (quiz_id, deadline, reminders, answers): (
        i64,
        DateTime<FixedOffset>,
        reminders::ReminderSet,
        Vec<(u32, String)>,
    ),
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(message) = q.message.as_ref() else { return Ok(()) };

    match q.data.as_deref() {
        Some(CB_SUBMIT) => {
            let user_id = q.from.id.0 as i64;

            if config.now() > deadline {
                reminders.cancel();
                bot.edit_message_text(
                    message.chat.id,
                    message.id,
                    "❌ The deadline passed while you were answering. The submission cannot be accepted.",
                )
                .await?;
                dialogue.exit().await?;
                return Ok(());
            }

            if db.has_submission(user_id, quiz_id).await? {
                reminders.cancel();
                bot.edit_message_text(
                    message.chat.id,
                    message.id,
                    "⚠️ You have already taken this quiz. Resubmitting is not allowed.",
                )
                .await?;
                dialogue.exit().await?;
                return Ok(());
            }

            let key = db.question_keys(quiz_id).await?;
            let mut submitted = HashMap::new();
            for (number, answer) in &answers {
                submitted.insert(*number, answer.clone());
            }
            let report = score(&key, &submitted);

            let raw_block: Vec<String> =
                answers.iter().map(|(n, a)| format!("{n} {a}")).collect();
            if let Err(err) =
                db.save_submission(user_id, quiz_id, &raw_block.join("\n"), config.now()).await
            {
                bot.send_message(
                    message.chat.id,
                    "⚠️ Something went wrong while saving your answers. Try again later.",
                )
                .await?;
                return Err(err);
            }

            reminders.cancel();
            bot.edit_message_text(message.chat.id, message.id, render_report(&report)).await?;
            dialogue.exit().await?;
            log::info!("submission saved for user {user_id} on quiz {quiz_id}");
        }
        Some(CB_RETRY) => {
            bot.edit_message_text(
                message.chat.id,
                message.id,
                format!("🔁 Enter your answers again.\n\n{ANSWERS_FORMAT_HELP}"),
            )
            .await?;
            dialogue.update(State::AwaitingAnswers { quiz_id, deadline, reminders }).await?;
        }
        Some(CB_CANCEL) => {
            reminders.cancel();
            bot.edit_message_text(message.chat.id, message.id, CANCELLED_TEXT).await?;
            dialogue.exit().await?;
        }
        _ => {}
    }
    Ok(())
}

fn render_report(report: &ScoreReport) -> String {
    let mut lines: Vec<String> = report
        .per_question
        .iter()
        .map(|q| {
            let shown = q.submitted.as_deref().unwrap_or("—");
            let icon = if q.correct { "✅" } else { "❌" };
            format!("{}: {} {}", q.number, shown, icon)
        })
        .collect();
    lines.push(String::new());
    lines.push(format!("🎯 Solved: {} of {}", report.solved, report.per_question.len()));
    lines.push(format!("Total score: {} of {}", report.total_score, report.max_score));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionKey;

    #[test]
    fn report_shows_a_placeholder_for_missing_answers() {
        let key = vec![
            QuestionKey { number: 1, answer: "a".into(), weight: 1.0 },
            QuestionKey { number: 2, answer: "b".into(), weight: 2.0 },
        ];
        let mut submitted = HashMap::new();
        submitted.insert(1, "A".to_owned());
        let rendered = render_report(&score(&key, &submitted));
        assert_eq!(
            rendered,
            "1: A ✅\n2: — ❌\n\n🎯 Solved: 1 of 2\nTotal score: 1 of 3"
        );
    }
}
