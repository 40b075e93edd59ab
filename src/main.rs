mod config;
mod db;
mod error;
mod flows;
mod quiz;
mod reminders;
mod state;

use teloxide::dispatching::dialogue::{self, InMemStorage};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::config::Config;
use crate::db::Db;
use crate::error::BotError;
use crate::state::State;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    #[command(description = "show the main menu")]
    Start,
    #[command(description = "abort the current conversation")]
    Cancel,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init();
    log::info!("starting the quiz bot...");

    let config = Config::from_env().expect("invalid environment configuration");
    let db = Db::connect(&config.database_url)
        .await
        .expect("failed to open the database");
    db.migrate().await.expect("failed to prepare the database schema");

    let bot = Bot::from_env();

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![InMemStorage::<State>::new(), db, config])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn schema() -> UpdateHandler<BotError> {
    use teloxide::dptree::case;

    let command_handler =
        teloxide::filter_command::<Command, _>().endpoint(flows::menu::handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(case![State::Idle].endpoint(flows::menu::handle_menu))
        .branch(case![State::AwaitingFullName].endpoint(flows::menu::receive_full_name))
        .branch(case![State::AddingAdmin].endpoint(flows::menu::receive_admin_to_add))
        .branch(case![State::RemovingAdmin].endpoint(flows::menu::receive_admin_to_remove))
        .branch(case![State::AwaitingTitle].endpoint(flows::authoring::receive_title))
        .branch(case![State::AwaitingQuestions { title }].endpoint(flows::authoring::receive_questions))
        .branch(
            case![State::AwaitingDeadline { title, questions }]
                .endpoint(flows::authoring::receive_deadline),
        )
        .branch(case![State::AwaitingCode].endpoint(flows::taking::receive_code))
        .branch(
            case![State::AwaitingAnswers { quiz_id, deadline, reminders }]
                .endpoint(flows::taking::receive_answers),
        );

    let callback_handler = Update::filter_callback_query()
        .branch(case![State::ConfirmingFullName { full_name }].endpoint(flows::menu::name_decision))
        .branch(case![State::ConfirmingTitle { title }].endpoint(flows::authoring::title_decision))
        .branch(
            case![State::ConfirmingQuestions { title, questions }]
                .endpoint(flows::authoring::questions_decision),
        )
        .branch(
            case![State::ConfirmingQuiz { title, questions, deadline }]
                .endpoint(flows::authoring::commit_decision),
        )
        .branch(case![State::AwaitingCode].endpoint(flows::taking::cancel_at_code))
        .branch(
            case![State::AwaitingAnswers { quiz_id, deadline, reminders }]
                .endpoint(flows::taking::cancel_at_answers),
        )
        .branch(
            case![State::ConfirmingAnswers { quiz_id, deadline, reminders, answers }]
                .endpoint(flows::taking::confirm_decision),
        )
        .branch(dptree::endpoint(flows::results::handle_browse));

    dialogue::enter::<Update, InMemStorage<State>, State, _>()
        .branch(message_handler)
        .branch(callback_handler)
}
