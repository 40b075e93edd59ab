use chrono::{DateTime, FixedOffset};
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html;

use crate::config::Config;
use crate::db::Db;
use crate::error::{BotError, HandlerResult};
use crate::quiz::deadline::{format_instant, parse_deadline};
use crate::quiz::parse::{dedupe_last_wins, parse_answer_key};
use crate::quiz::{render_key, QuestionKey};
use crate::state::{MyDialogue, State};

const QUESTIONS_FORMAT_HELP: &str = "✏️ ENTER THE ANSWER KEY LINE BY LINE, EACH LINE AS:\n\n\
NUMBER ANSWER SCORE\n\
Scores must be positive multiples of 0.5 (for example: 1, 2.5, 3.0)\n\n\
✅ ACCEPTED ANSWERS:\n\
• A, B, C\n\
• integers (for example: 1, -12, 12345)\n\
• simple fractions (for example: 3/4, -2/3)\n\
• decimals (for example: 0.667, -0.75, 123.4)\n\
• at most 5 characters (6 with a minus)\n\n\
✅ EXAMPLES:\n\
1 A 1\n\
2 3/4 0.5\n\
3 -2/3 1.5\n\
4 -0.75 2\n\
5 0.667 2.5\n\
6 12345 1\n\
7 123.4 3\n\
8 -12.3 2.5\n\
9 -1.5 1.5\n\
10 B 1";

const DEADLINE_FORMAT_HELP: &str = "📅 Send the deadline as:\nHH:MM or HH:MM DD.MM.YYYY";

const CB_TITLE_CONFIRM: &str = "authoring_title_confirm";
const CB_TITLE_EDIT: &str = "authoring_title_edit";
const CB_QUESTIONS_CONFIRM: &str = "authoring_questions_confirm";
const CB_QUESTIONS_EDIT: &str = "authoring_questions_edit";
const CB_COMMIT: &str = "authoring_commit";
const CB_DEADLINE_EDIT: &str = "authoring_deadline_edit";
const CB_CANCEL: &str = "authoring_cancel";

/// Entry point from the main menu. Only admins and the owner get past here;
/// everyone else is rejected without a state change.
pub async fn begin(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    msg: Message,
) -> HandlerResult {
    let Some(user) = msg.from() else { return Ok(()) };
    if !db.is_admin_or_owner(user.id.0 as i64, config.owner_id).await? {
        bot.send_message(msg.chat.id, "🚫 You are not allowed to create quizzes.").await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "📝 Send the quiz title:").await?;
    dialogue.update(State::AwaitingTitle).await?;
    Ok(())
}

pub async fn receive_title(bot: Bot, dialogue: MyDialogue, msg: Message) -> HandlerResult {
    let title = match msg.text().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_owned(),
        _ => {
            bot.send_message(msg.chat.id, "Send the title as plain text.").await?;
            return Ok(());
        }
    };

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("✅ Confirm", CB_TITLE_CONFIRM),
            InlineKeyboardButton::callback("✏️ Enter another", CB_TITLE_EDIT),
        ],
        vec![InlineKeyboardButton::callback("❌ Cancel creation", CB_CANCEL)],
    ]);
    bot.send_message(
        msg.chat.id,
        format!("Quiz title: <b>{}</b>\nConfirm?", html::escape(&title)),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard)
    .await?;
    dialogue.update(State::ConfirmingTitle { title }).await?;
    Ok(())
}

pub async fn title_decision(
    bot: Bot,
    dialogue: MyDialogue,
    q: CallbackQuery,
    title: String,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(message) = q.message.as_ref() else { return Ok(()) };

    match q.data.as_deref() {
        Some(CB_TITLE_CONFIRM) => {
            bot.edit_message_text(
                message.chat.id,
                message.id,
                "✅ Title confirmed. Now enter the answer key.",
            )
            .await?;
            bot.send_message(message.chat.id, QUESTIONS_FORMAT_HELP).await?;
            dialogue.update(State::AwaitingQuestions { title }).await?;
        }
        Some(CB_TITLE_EDIT) => {
            bot.edit_message_text(message.chat.id, message.id, "✏️ Send another title:").await?;
            dialogue.update(State::AwaitingTitle).await?;
        }
        Some(CB_CANCEL) => cancel(&bot, &dialogue, message).await?,
        _ => {}
    }
    Ok(())
}

pub async fn receive_questions(
    bot: Bot,
    dialogue: MyDialogue,
    msg: Message,
    title: String,
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, QUESTIONS_FORMAT_HELP).await?;
        return Ok(());
    };

    let questions = match parse_answer_key(text) {
        Ok(parsed) => dedupe_last_wins(parsed),
        Err(err) => {
            bot.send_message(msg.chat.id, format!("❌ {err}\n\n{QUESTIONS_FORMAT_HELP}"))
                .await?;
            return Ok(());
        }
    };
    if questions.is_empty() {
        bot.send_message(msg.chat.id, format!("❌ THE ANSWER KEY IS EMPTY\n\n{QUESTIONS_FORMAT_HELP}"))
            .await?;
        return Ok(());
    }

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("✅ Confirm", CB_QUESTIONS_CONFIRM),
            InlineKeyboardButton::callback("🔁 Enter again", CB_QUESTIONS_EDIT),
        ],
        vec![InlineKeyboardButton::callback("❌ Cancel creation", CB_CANCEL)],
    ]);
    bot.send_message(
        msg.chat.id,
        format!("Here is what I got:\n\n{}\n\nConfirm?", render_key(&questions)),
    )
    .reply_markup(keyboard)
    .await?;
    dialogue.update(State::ConfirmingQuestions { title, questions }).await?;
    Ok(())
}

pub async fn questions_decision(
    bot: Bot,
    dialogue: MyDialogue,
    q: CallbackQuery,
    (title, questions): (String, Vec<QuestionKey>),
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(message) = q.message.as_ref() else { return Ok(()) };

    match q.data.as_deref() {
        Some(CB_QUESTIONS_CONFIRM) => {
            bot.edit_message_text(
                message.chat.id,
                message.id,
                "✅ Answer key confirmed. Now set the deadline.",
            )
            .await?;
            bot.send_message(message.chat.id, DEADLINE_FORMAT_HELP).await?;
            dialogue.update(State::AwaitingDeadline { title, questions }).await?;
        }
        Some(CB_QUESTIONS_EDIT) => {
            bot.edit_message_text(message.chat.id, message.id, QUESTIONS_FORMAT_HELP).await?;
            dialogue.update(State::AwaitingQuestions { title }).await?;
        }
        Some(CB_CANCEL) => cancel(&bot, &dialogue, message).await?,
        _ => {}
    }
    Ok(())
}

pub async fn receive_deadline(
    bot: Bot,
    dialogue: MyDialogue,
    config: Config,
    msg: Message,
    (title, questions): (String, Vec<QuestionKey>),
) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, DEADLINE_FORMAT_HELP).await?;
        return Ok(());
    };

    let Some(deadline) = parse_deadline(text, config.now()) else {
        bot.send_message(msg.chat.id, "❌ Wrong format. Example: 22:00 or 22:00 07.07.2025")
            .await?;
        return Ok(());
    };

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![
            InlineKeyboardButton::callback("✅ Confirm", CB_COMMIT),
            InlineKeyboardButton::callback("🔁 Change deadline", CB_DEADLINE_EDIT),
        ],
        vec![InlineKeyboardButton::callback("❌ Cancel creation", CB_CANCEL)],
    ]);
    bot.send_message(
        msg.chat.id,
        format!(
            "🔍 Review:\n<b>{}</b>\n⏰ Deadline: {}\n\n{}",
            html::escape(&title),
            format_instant(&deadline),
            html::escape(&render_key(&questions))
        ),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard)
    .await?;
    dialogue.update(State::ConfirmingQuiz { title, questions, deadline }).await?;
    Ok(())
}

/// Final confirm step. The only durable write of the whole flow happens here.
pub async fn commit_decision(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    q: CallbackQuery,
    (title, questions, deadline): (String, Vec<QuestionKey>, DateTime<FixedOffset>),
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(message) = q.message.as_ref() else { return Ok(()) };

    match q.data.as_deref() {
        Some(CB_COMMIT) => {
            let admin_id = q.from.id.0 as i64;
            match commit(&db, &config, admin_id, &title, &questions, deadline).await {
                Ok(code) => {
                    bot.edit_message_text(
                        message.chat.id,
                        message.id,
                        format!("✅ Quiz created!\nCode: <code>{code}</code>"),
                    )
                    .parse_mode(ParseMode::Html)
                    .await?;
                    dialogue.exit().await?;
                }
                Err(err) => {
                    bot.send_message(
                        message.chat.id,
                        "⚠️ Something went wrong while saving the quiz. Try again later.",
                    )
                    .await?;
                    return Err(err);
                }
            }
        }
        Some(CB_DEADLINE_EDIT) => {
            bot.edit_message_text(message.chat.id, message.id, DEADLINE_FORMAT_HELP).await?;
            dialogue.update(State::AwaitingDeadline { title, questions }).await?;
        }
        Some(CB_CANCEL) => cancel(&bot, &dialogue, message).await?,
        _ => {}
    }
    Ok(())
}

async fn commit(
    db: &Db,
    config: &Config,
    admin_id: i64,
    title: &str,
    questions: &[QuestionKey],
    deadline: DateTime<FixedOffset>,
) -> Result<String, BotError> {
    let code = db.generate_code(config.code_length).await?;
    let quiz_id = db.create_quiz(title, &code, admin_id, deadline, config.now()).await?;
    for question in questions {
        db.add_question(quiz_id, question).await?;
    }
    log::info!("quiz {quiz_id} created by {admin_id} with {} questions", questions.len());
    Ok(code)
}

async fn cancel(bot: &Bot, dialogue: &MyDialogue, message: &Message) -> HandlerResult {
    bot.edit_message_text(message.chat.id, message.id, "❌ Quiz creation cancelled.").await?;
    dialogue.exit().await?;
    Ok(())
}
