use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html;

use crate::config::Config;
use crate::db::Db;
use crate::error::HandlerResult;
use crate::quiz::deadline::format_instant;
use crate::quiz::render_key;
use crate::quiz::score::{answers_map, rank_submissions, score};

const CB_QUIZ: &str = "quiz:";
const CB_RESULTS: &str = "results:";
const CB_ANSWERS: &str = "answers:";
const CB_DELETE: &str = "delete:";
const CB_DROP: &str = "drop:";

/// "My quizzes" menu tap: list the caller's quizzes as inline buttons.
pub async fn my_quizzes(bot: Bot, db: Db, config: Config, msg: Message) -> HandlerResult {
    let Some(user) = msg.from() else { return Ok(()) };
    let user_id = user.id.0 as i64;
    if !db.is_admin_or_owner(user_id, config.owner_id).await? {
        return Ok(());
    }

    let quizzes = db.quizzes_by_admin(user_id).await?;
    if quizzes.is_empty() {
        bot.send_message(msg.chat.id, "📭 You have no quizzes yet.").await?;
        return Ok(());
    }

    let rows: Vec<Vec<InlineKeyboardButton>> = quizzes
        .into_iter()
        .map(|(quiz_id, title)| {
            vec![InlineKeyboardButton::callback(title, format!("{CB_QUIZ}{quiz_id}"))]
        })
        .collect();
    bot.send_message(msg.chat.id, "📚 Pick a quiz:")
        .reply_markup(InlineKeyboardMarkup::new(rows))
        .await?;
    Ok(())
}

/// Fallback for callback presses that are not bound to a dialogue step: the
/// owner-side browsing actions carried in the callback data itself.
pub async fn handle_browse(bot: Bot, db: Db, q: CallbackQuery) -> HandlerResult {
    let Some(data) = q.data.as_deref() else { return Ok(()) };
    let Some(message) = q.message.as_ref() else { return Ok(()) };
    bot.answer_callback_query(q.id.clone()).await?;

    if let Some(quiz_id) = data.strip_prefix(CB_QUIZ).and_then(parse_id) {
        show_quiz(&bot, &db, message, quiz_id).await
    } else if let Some(quiz_id) = data.strip_prefix(CB_RESULTS).and_then(parse_id) {
        show_results(&bot, &db, message, quiz_id).await
    } else if let Some((quiz_id, user_id)) = data.strip_prefix(CB_ANSWERS).and_then(parse_pair) {
        show_answers(&bot, &db, message, quiz_id, user_id).await
    } else if let Some(quiz_id) = data.strip_prefix(CB_DELETE).and_then(parse_id) {
        confirm_delete(&bot, &db, message, quiz_id).await
    } else if let Some(quiz_id) = data.strip_prefix(CB_DROP).and_then(parse_id) {
        db.delete_quiz(quiz_id).await?;
        log::info!("quiz {quiz_id} deleted");
        bot.edit_message_text(message.chat.id, message.id, "✅ Quiz deleted.").await?;
        Ok(())
    } else {
        Ok(())
    }
}

async fn show_quiz(bot: &Bot, db: &Db, message: &Message, quiz_id: i64) -> HandlerResult {
    let Some(overview) = db.quiz_overview(quiz_id).await? else {
        bot.edit_message_text(message.chat.id, message.id, "❌ Quiz not found.").await?;
        return Ok(());
    };

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("📊 View results", format!("{CB_RESULTS}{quiz_id}"))],
        vec![InlineKeyboardButton::callback("🗑 Delete quiz", format!("{CB_DELETE}{quiz_id}"))],
    ]);
    bot.edit_message_text(message.chat.id, message.id, overview_text(&overview))
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn confirm_delete(bot: &Bot, db: &Db, message: &Message, quiz_id: i64) -> HandlerResult {
    let Some(overview) = db.quiz_overview(quiz_id).await? else {
        bot.edit_message_text(message.chat.id, message.id, "❌ Quiz not found.").await?;
        return Ok(());
    };

    let text = format!(
        "{}\n\n\n<b>DELETE THE QUIZ \"{}\"?</b>",
        overview_text(&overview),
        html::escape(&overview.title)
    );
    let keyboard = InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Yes", format!("{CB_DROP}{quiz_id}")),
        InlineKeyboardButton::callback("❌ No", format!("{CB_QUIZ}{quiz_id}")),
    ]]);
    bot.edit_message_text(message.chat.id, message.id, text)
        .parse_mode(ParseMode::Html)
        .reply_markup(keyboard)
        .await?;
    Ok(())
}

async fn show_results(bot: &Bot, db: &Db, message: &Message, quiz_id: i64) -> HandlerResult {
    let key = db.question_keys(quiz_id).await?;
    let rows = db.submissions_with_participants(quiz_id).await?;
    let ranked = rank_submissions(&key, &rows);

    if ranked.is_empty() {
        bot.send_message(message.chat.id, "📭 Nobody has submitted this quiz yet.").await?;
        return Ok(());
    }

    bot.send_message(message.chat.id, "📊 <b>Participant results:</b>")
        .parse_mode(ParseMode::Html)
        .await?;

    for entry in ranked {
        let mut text = format!(
            "👤 <b>PARTICIPANT</b>\n\nName: {}\n",
            html::escape(entry.full_name.as_deref().unwrap_or("—"))
        );
        if let Some(username) = &entry.username {
            text.push_str(&format!("🆔 Username: @{}\n", html::escape(username)));
        }
        text.push_str(&format!(
            "🕒 Submitted: {}\n\n✅ Solved: {} of {}\n💯 Score: {} of {}\n",
            format_instant(&entry.submitted_at),
            entry.solved,
            entry.question_count,
            entry.total_score,
            entry.max_score,
        ));

        let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::callback(
            "🔍 View answers",
            format!("{CB_ANSWERS}{quiz_id}:{}", entry.user_id),
        )]]);
        bot.send_message(message.chat.id, text)
            .parse_mode(ParseMode::Html)
            .reply_markup(keyboard)
            .await?;
    }
    Ok(())
}

async fn show_answers(
    bot: &Bot,
    db: &Db,
    message: &Message,
    quiz_id: i64,
    user_id: i64,
) -> HandlerResult {
    let Some(raw) = db.submission_text(quiz_id, user_id).await? else {
        bot.send_message(message.chat.id, "❌ No answers found.").await?;
        return Ok(());
    };

    let key = db.question_keys(quiz_id).await?;
    let report = score(&key, &answers_map(&raw));

    let mut text = String::from("📋 <b>PARTICIPANT ANSWERS:</b>\n\n");
    for question in &report.per_question {
        let icon = if question.correct { "✅" } else { "❌" };
        text.push_str(&format!(
            "{}. {} ({}) {}\n",
            question.number,
            html::escape(question.submitted.as_deref().unwrap_or("—")),
            question.weight,
            icon
        ));
    }
    bot.send_message(message.chat.id, text).parse_mode(ParseMode::Html).await?;
    Ok(())
}

fn overview_text(overview: &crate::db::QuizOverview) -> String {
    format!(
        "📄 <b>{}</b>\n🔐 Code: <code>{}</code>\n⏰ Deadline: {}\n👥 Submitted: {}\n\n{}",
        html::escape(&overview.title),
        overview.code,
        format_instant(&overview.deadline),
        overview.submissions,
        html::escape(&render_key(&overview.questions))
    )
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.parse().ok()
}

fn parse_pair(raw: &str) -> Option<(i64, i64)> {
    let (quiz, user) = raw.split_once(':')?;
    Some((quiz.parse().ok()?, user.parse().ok()?))
}
