use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup, ParseMode};
use teloxide::utils::html;

use crate::config::Config;
use crate::db::Db;
use crate::error::HandlerResult;
use crate::quiz::deadline::format_instant;
use crate::state::{MyDialogue, State};
use crate::Command;

use super::{authoring, results, taking};

pub const TAKE_QUIZ: &str = "✅ Take a quiz";
pub const MY_PROFILE: &str = "👤 My profile";
pub const CREATE_QUIZ: &str = "📝 Create a quiz";
pub const MY_QUIZZES: &str = "📚 My quizzes";
pub const ADD_ADMIN: &str = "➕ Add admin";
pub const REMOVE_ADMIN: &str = "➖ Remove admin";
pub const LIST_ADMINS: &str = "📋 List admins";

const CB_NAME_CONFIRM: &str = "name_confirm";
const CB_NAME_REDO: &str = "name_redo";

const NAME_PROMPT: &str = "📝 Send your last and first name in latin letters\nexample: Ivanov Ivan";

pub fn main_keyboard(is_admin: bool, is_owner: bool) -> KeyboardMarkup {
    let mut rows = vec![vec![
        KeyboardButton::new(TAKE_QUIZ),
        KeyboardButton::new(MY_PROFILE),
    ]];
    if is_admin || is_owner {
        rows.push(vec![
            KeyboardButton::new(CREATE_QUIZ),
            KeyboardButton::new(MY_QUIZZES),
        ]);
    }
    if is_owner {
        rows.push(vec![
            KeyboardButton::new(ADD_ADMIN),
            KeyboardButton::new(REMOVE_ADMIN),
        ]);
        rows.push(vec![KeyboardButton::new(LIST_ADMINS)]);
    }
    KeyboardMarkup::new(rows).resize_keyboard(true)
}

fn role_label(is_admin: bool, is_owner: bool) -> &'static str {
    if is_owner {
        "👑 Owner"
    } else if is_admin {
        "🛡 Admin"
    } else {
        "👤 Participant"
    }
}

/// Commands supersede whatever conversation is in flight, so any reminder
/// group owned by the current step is torn down before the reset.
pub async fn handle_command(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    msg: Message,
    cmd: Command,
) -> HandlerResult {
    if let Some(state) = dialogue.get().await? {
        if let Some(reminders) = state.reminder_set() {
            reminders.cancel();
        }
    }
    dialogue.exit().await?;

    match cmd {
        Command::Start => start(&bot, &dialogue, &db, &config, &msg).await,
        Command::Cancel => {
            let user_id = msg.from().map(|user| user.id.0 as i64).unwrap_or_default();
            let is_owner = config.is_owner(user_id);
            let is_admin = db.is_admin(user_id).await?;
            bot.send_message(msg.chat.id, "Cancelled. Back to the main menu.")
                .reply_markup(main_keyboard(is_admin, is_owner))
                .await?;
            Ok(())
        }
    }
}

async fn start(
    bot: &Bot,
    dialogue: &MyDialogue,
    db: &Db,
    config: &Config,
    msg: &Message,
) -> HandlerResult {
    let Some(user) = msg.from() else { return Ok(()) };
    let user_id = user.id.0 as i64;
    db.upsert_user(user_id, user.username.as_deref(), config.now()).await?;

    match db.full_name(user_id).await? {
        Some(full_name) => {
            let is_owner = config.is_owner(user_id);
            let is_admin = db.is_admin(user_id).await?;
            bot.send_message(
                msg.chat.id,
                format!(
                    "👋 Welcome back, <b>{}</b>!\nYou are signed in as: <b>{}</b>",
                    html::escape(&full_name),
                    role_label(is_admin, is_owner)
                ),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(main_keyboard(is_admin, is_owner))
            .await?;
        }
        None => {
            bot.send_message(msg.chat.id, NAME_PROMPT).await?;
            dialogue.update(State::AwaitingFullName).await?;
        }
    }
    Ok(())
}

/// Routes plain-text menu taps while no conversation is in flight.
pub async fn handle_menu(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    msg: Message,
) -> HandlerResult {
    let Some(user) = msg.from() else { return Ok(()) };
    let user_id = user.id.0 as i64;
    let Some(text) = msg.text() else { return Ok(()) };

    match text {
        TAKE_QUIZ => taking::begin(bot, dialogue, msg).await,
        MY_PROFILE => profile(&bot, &db, &msg, user_id).await,
        CREATE_QUIZ => authoring::begin(bot, dialogue, db, config, msg).await,
        MY_QUIZZES => results::my_quizzes(bot, db, config, msg).await,
        ADD_ADMIN if config.is_owner(user_id) => {
            bot.send_message(msg.chat.id, "🔢 Send the numeric id of the user to promote:")
                .await?;
            dialogue.update(State::AddingAdmin).await?;
            Ok(())
        }
        REMOVE_ADMIN if config.is_owner(user_id) => {
            bot.send_message(msg.chat.id, "🔢 Send the numeric id of the admin to remove:")
                .await?;
            dialogue.update(State::RemovingAdmin).await?;
            Ok(())
        }
        LIST_ADMINS if config.is_owner(user_id) => list_admins(&bot, &db, &msg).await,
        _ => {
            bot.send_message(msg.chat.id, "Use the menu buttons, or /start to show them.")
                .await?;
            Ok(())
        }
    }
}

pub async fn receive_full_name(bot: Bot, dialogue: MyDialogue, msg: Message) -> HandlerResult {
    let Some(text) = msg.text() else {
        bot.send_message(msg.chat.id, NAME_PROMPT).await?;
        return Ok(());
    };

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < 2 {
        bot.send_message(msg.chat.id, "❗ Send both your last and first name, separated by a space.")
            .await?;
        return Ok(());
    }
    let full_name = words.join(" ").to_uppercase();

    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("✅ Confirm", CB_NAME_CONFIRM)],
        vec![InlineKeyboardButton::callback("✏️ Send again", CB_NAME_REDO)],
    ]);
    bot.send_message(
        msg.chat.id,
        format!("You entered: <b>{}</b>\nIs that right?", html::escape(&full_name)),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(keyboard)
    .await?;
    dialogue.update(State::ConfirmingFullName { full_name }).await?;
    Ok(())
}

pub async fn name_decision(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    q: CallbackQuery,
    full_name: String,
) -> HandlerResult {
    bot.answer_callback_query(q.id.clone()).await?;
    let Some(message) = q.message.as_ref() else { return Ok(()) };

    match q.data.as_deref() {
        Some(CB_NAME_CONFIRM) => {
            let user_id = q.from.id.0 as i64;
            db.set_full_name(user_id, &full_name).await?;
            dialogue.exit().await?;

            let is_owner = config.is_owner(user_id);
            let is_admin = db.is_admin(user_id).await?;
            bot.edit_message_text(
                message.chat.id,
                message.id,
                format!(
                    "✅ Thanks, {}!\nYou are signed in as: <b>{}</b>",
                    html::escape(&full_name),
                    role_label(is_admin, is_owner)
                ),
            )
            .parse_mode(ParseMode::Html)
            .await?;
            bot.send_message(message.chat.id, "📋 Main menu:")
                .reply_markup(main_keyboard(is_admin, is_owner))
                .await?;
        }
        Some(CB_NAME_REDO) => {
            bot.edit_message_text(message.chat.id, message.id, NAME_PROMPT).await?;
            dialogue.update(State::AwaitingFullName).await?;
        }
        _ => {}
    }
    Ok(())
}

pub async fn receive_admin_to_add(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    config: Config,
    msg: Message,
) -> HandlerResult {
    let reply = match msg.text().map(|text| text.trim().parse::<i64>()) {
        Some(Ok(admin_id)) => {
            db.add_admin(admin_id, config.now()).await?;
            log::info!("admin {admin_id} added to the roster");
            format!("✅ Admin {admin_id} added.")
        }
        _ => "❌ That does not look like a numeric id.".to_owned(),
    };
    bot.send_message(msg.chat.id, reply).await?;
    dialogue.exit().await?;
    Ok(())
}

pub async fn receive_admin_to_remove(
    bot: Bot,
    dialogue: MyDialogue,
    db: Db,
    msg: Message,
) -> HandlerResult {
    let reply = match msg.text().map(|text| text.trim().parse::<i64>()) {
        Some(Ok(admin_id)) => {
            db.remove_admin(admin_id).await?;
            log::info!("admin {admin_id} removed from the roster");
            format!("✅ Admin {admin_id} removed.")
        }
        _ => "❌ That does not look like a numeric id.".to_owned(),
    };
    bot.send_message(msg.chat.id, reply).await?;
    dialogue.exit().await?;
    Ok(())
}

async fn list_admins(bot: &Bot, db: &Db, msg: &Message) -> HandlerResult {
    let admins = db.admin_ids().await?;
    let text = if admins.is_empty() {
        "The admin list is empty.".to_owned()
    } else {
        let lines: Vec<String> = admins.iter().map(|id| format!("• {id}")).collect();
        format!("📋 Admins:\n{}", lines.join("\n"))
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn profile(bot: &Bot, db: &Db, msg: &Message, user_id: i64) -> HandlerResult {
    let submissions = db.submissions_by_user(user_id).await?;
    if submissions.is_empty() {
        bot.send_message(msg.chat.id, "📭 You have not taken any quizzes yet.").await?;
        return Ok(());
    }

    let mut text = String::from("<b>📊 My profile:</b>\n\n");
    for (title, submitted_at, answer_text) in &submissions {
        let answered = answer_text.lines().filter(|line| !line.trim().is_empty()).count();
        text.push_str(&format!(
            "📄 <b>{}</b>\n📅 {}\nAnswers: {answered}\n\n",
            html::escape(title),
            format_instant(submitted_at),
        ));
    }
    bot.send_message(msg.chat.id, text.trim_end().to_owned())
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
