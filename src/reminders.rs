use chrono::{DateTime, Duration, FixedOffset};
use teloxide::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::db::Db;
use crate::error::BotError;
use crate::state::{MyDialogue, State};

const FIRST_WARNING: &str = "⏰ 15 minutes left. Pace yourself and don't rush.";
const LAST_WARNING: &str = "⚠️ 3 minutes left. Time to wrap up.";
const TIME_UP: &str = "🕰 Time is up. This quiz is no longer open for submissions.";

/// The cancellable group of reminder tasks backing one quiz attempt. Clones
/// share the same token, so the copy stored in the dialogue state cancels
/// tasks spawned before it was stored. Cancellation is idempotent.
#[derive(Clone, Debug, Default)]
pub struct ReminderSet {
    token: CancellationToken,
}

impl ReminderSet {
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Spawn one deferred task per notice still ahead of `now`. Each task
/// re-checks, at fire time, that the attempt is still unsubmitted and the
/// conversation still active; otherwise it stays silent. The tasks run
/// alongside conversation handling and never block it.
pub fn schedule(
    bot: Bot,
    db: Db,
    dialogue: MyDialogue,
    user_id: i64,
    quiz_id: i64,
    deadline: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> ReminderSet {
    let set = ReminderSet::default();
    for (delay, text) in pending_notices(deadline, now) {
        let bot = bot.clone();
        let db = db.clone();
        let dialogue = dialogue.clone();
        let token = set.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    deliver(&bot, &db, &dialogue, user_id, quiz_id, text).await;
                }
            }
        });
    }
    set
}

/// The notices whose delay from `now` is non-negative, soonest first.
fn pending_notices(
    deadline: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Vec<(std::time::Duration, &'static str)> {
    [
        (Duration::minutes(15), FIRST_WARNING),
        (Duration::minutes(3), LAST_WARNING),
        (Duration::zero(), TIME_UP),
    ]
    .into_iter()
    .filter_map(|(lead, text)| (deadline - lead - now).to_std().ok().map(|delay| (delay, text)))
    .collect()
}

async fn deliver(
    bot: &Bot,
    db: &Db,
    dialogue: &MyDialogue,
    user_id: i64,
    quiz_id: i64,
    text: &'static str,
) {
    match still_waiting(db, dialogue, user_id, quiz_id).await {
        Ok(true) => {
            // delivery failures are swallowed: logged, never surfaced, never retried
            if let Err(err) = bot.send_message(ChatId(user_id), text).await {
                log::warn!("failed to deliver a deadline reminder to {user_id}: {err}");
            }
        }
        Ok(false) => {}
        Err(err) => log::warn!("skipping a deadline reminder for {user_id}: {err}"),
    }
}

async fn still_waiting(
    db: &Db,
    dialogue: &MyDialogue,
    user_id: i64,
    quiz_id: i64,
) -> Result<bool, BotError> {
    if db.has_submission(user_id, quiz_id).await? {
        return Ok(false);
    }
    let state = dialogue.get().await?;
    Ok(!matches!(state, None | Some(State::Idle)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 7, 7, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn all_three_notices_are_pending_for_a_far_deadline() {
        let notices = pending_notices(at(13, 0), at(12, 0));
        let delays: Vec<u64> = notices.iter().map(|(d, _)| d.as_secs()).collect();
        assert_eq!(delays, vec![45 * 60, 57 * 60, 60 * 60]);
        assert_eq!(notices[0].1, FIRST_WARNING);
        assert_eq!(notices[2].1, TIME_UP);
    }

    #[test]
    fn notices_already_in_the_past_are_dropped() {
        let notices = pending_notices(at(12, 10), at(12, 0));
        let texts: Vec<&str> = notices.iter().map(|(_, t)| *t).collect();
        assert_eq!(texts, vec![LAST_WARNING, TIME_UP]);
    }

    #[test]
    fn an_expired_deadline_schedules_nothing() {
        assert!(pending_notices(at(11, 0), at(12, 0)).is_empty());
    }

    #[tokio::test]
    async fn cancelling_the_set_stops_pending_tasks() {
        let set = ReminderSet::default();
        let fired = Arc::new(AtomicBool::new(false));

        let token = set.token.clone();
        let flag = Arc::clone(&fired);
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(std::time::Duration::from_secs(60)) => {
                    flag.store(true, Ordering::SeqCst);
                }
            }
        });

        // a clone shares the token, like the copy held in the dialogue state
        set.clone().cancel();
        task.await.unwrap();
        assert!(!fired.load(Ordering::SeqCst));
    }
}
