use std::str::FromStr;

use chrono::{DateTime, FixedOffset};
use rand::Rng;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::error::BotError;
use crate::quiz::score::SubmissionRow;
use crate::quiz::QuestionKey;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        user_id INTEGER PRIMARY KEY,
        full_name TEXT,
        username TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS admins (
        admin_id INTEGER PRIMARY KEY,
        added_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS quizzes (
        quiz_id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        code TEXT NOT NULL UNIQUE,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_by INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        deadline TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS questions (
        question_id INTEGER PRIMARY KEY AUTOINCREMENT,
        quiz_id INTEGER NOT NULL REFERENCES quizzes(quiz_id),
        question_number INTEGER NOT NULL,
        correct_answer TEXT NOT NULL,
        score REAL NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS submissions (
        submission_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(user_id),
        quiz_id INTEGER NOT NULL REFERENCES quizzes(quiz_id),
        answer_text TEXT NOT NULL,
        submitted_at TEXT NOT NULL
    )",
];

/// An active quiz resolved from an access code.
#[derive(Debug, Clone)]
pub struct QuizRef {
    pub quiz_id: i64,
    pub deadline: DateTime<FixedOffset>,
}

/// Everything the owner's quiz view needs in one fetch.
#[derive(Debug, Clone)]
pub struct QuizOverview {
    pub title: String,
    pub code: String,
    pub deadline: DateTime<FixedOffset>,
    pub submissions: i64,
    pub questions: Vec<QuestionKey>,
}

/// The durable store shared by every conversation. Within one process, reads
/// observe earlier writes, which the query-before-write eligibility checks
/// rely on.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    pub async fn connect(url: &str) -> Result<Self, BotError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), BotError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    // --- users ---

    pub async fn upsert_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        now: DateTime<FixedOffset>,
    ) -> Result<(), BotError> {
        sqlx::query(
            "INSERT INTO users (user_id, username, created_at) VALUES (?, ?, ?)
             ON CONFLICT(user_id) DO UPDATE SET username = excluded.username",
        )
        .bind(user_id)
        .bind(username)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_full_name(&self, user_id: i64, full_name: &str) -> Result<(), BotError> {
        sqlx::query("UPDATE users SET full_name = ? WHERE user_id = ?")
            .bind(full_name)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn full_name(&self, user_id: i64) -> Result<Option<String>, BotError> {
        let row = sqlx::query("SELECT full_name FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("full_name")?),
            None => Ok(None),
        }
    }

    // --- admin roster ---

    pub async fn is_admin(&self, user_id: i64) -> Result<bool, BotError> {
        let row = sqlx::query("SELECT 1 FROM admins WHERE admin_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn is_admin_or_owner(&self, user_id: i64, owner_id: i64) -> Result<bool, BotError> {
        Ok(user_id == owner_id || self.is_admin(user_id).await?)
    }

    pub async fn add_admin(
        &self,
        user_id: i64,
        now: DateTime<FixedOffset>,
    ) -> Result<(), BotError> {
        sqlx::query("INSERT OR IGNORE INTO admins (admin_id, added_at) VALUES (?, ?)")
            .bind(user_id)
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_admin(&self, user_id: i64) -> Result<(), BotError> {
        sqlx::query("DELETE FROM admins WHERE admin_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn admin_ids(&self) -> Result<Vec<i64>, BotError> {
        let rows = sqlx::query("SELECT admin_id FROM admins ORDER BY admin_id")
            .fetch_all(&self.pool)
            .await?;
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            ids.push(row.try_get("admin_id")?);
        }
        Ok(ids)
    }

    // --- quizzes ---

    /// Generate an access code that no existing quiz uses. Regenerates on
    /// collision; the caller persists it right away.
    pub async fn generate_code(&self, length: usize) -> Result<String, BotError> {
        loop {
            let code = random_code(length);
            let taken = sqlx::query("SELECT 1 FROM quizzes WHERE code = ?")
                .bind(&code)
                .fetch_optional(&self.pool)
                .await?;
            if taken.is_none() {
                return Ok(code);
            }
        }
    }

    pub async fn create_quiz(
        &self,
        title: &str,
        code: &str,
        admin_id: i64,
        deadline: DateTime<FixedOffset>,
        now: DateTime<FixedOffset>,
    ) -> Result<i64, BotError> {
        let result = sqlx::query(
            "INSERT INTO quizzes (title, code, is_active, created_by, created_at, deadline)
             VALUES (?, ?, 1, ?, ?, ?)",
        )
        .bind(title)
        .bind(code)
        .bind(admin_id)
        .bind(now.to_rfc3339())
        .bind(deadline.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn add_question(
        &self,
        quiz_id: i64,
        question: &QuestionKey,
    ) -> Result<(), BotError> {
        sqlx::query(
            "INSERT INTO questions (quiz_id, question_number, correct_answer, score)
             VALUES (?, ?, ?, ?)",
        )
        .bind(quiz_id)
        .bind(question.number)
        .bind(&question.answer)
        .bind(question.weight)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_quiz_by_code(&self, code: &str) -> Result<Option<QuizRef>, BotError> {
        let row = sqlx::query("SELECT quiz_id, deadline FROM quizzes WHERE code = ? AND is_active = 1")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };
        Ok(Some(QuizRef {
            quiz_id: row.try_get("quiz_id")?,
            deadline: parse_instant(row.try_get("deadline")?)?,
        }))
    }

    pub async fn quizzes_by_admin(&self, admin_id: i64) -> Result<Vec<(i64, String)>, BotError> {
        let rows = sqlx::query("SELECT quiz_id, title FROM quizzes WHERE created_by = ?")
            .bind(admin_id)
            .fetch_all(&self.pool)
            .await?;
        let mut quizzes = Vec::with_capacity(rows.len());
        for row in rows {
            quizzes.push((row.try_get("quiz_id")?, row.try_get("title")?));
        }
        Ok(quizzes)
    }

    pub async fn quiz_overview(&self, quiz_id: i64) -> Result<Option<QuizOverview>, BotError> {
        let row = sqlx::query("SELECT title, code, deadline FROM quizzes WHERE quiz_id = ?")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else { return Ok(None) };

        let submissions =
            sqlx::query("SELECT COUNT(*) AS submissions FROM submissions WHERE quiz_id = ?")
                .bind(quiz_id)
                .fetch_one(&self.pool)
                .await?
                .try_get("submissions")?;

        Ok(Some(QuizOverview {
            title: row.try_get("title")?,
            code: row.try_get("code")?,
            deadline: parse_instant(row.try_get("deadline")?)?,
            submissions,
            questions: self.question_keys(quiz_id).await?,
        }))
    }

    pub async fn delete_quiz(&self, quiz_id: i64) -> Result<(), BotError> {
        sqlx::query("DELETE FROM questions WHERE quiz_id = ?")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM submissions WHERE quiz_id = ?")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM quizzes WHERE quiz_id = ?")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- question keys and submissions ---

    pub async fn question_keys(&self, quiz_id: i64) -> Result<Vec<QuestionKey>, BotError> {
        let rows = sqlx::query(
            "SELECT question_number, correct_answer, score FROM questions
             WHERE quiz_id = ? ORDER BY question_number",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(QuestionKey {
                number: row.try_get("question_number")?,
                answer: row.try_get("correct_answer")?,
                weight: row.try_get("score")?,
            });
        }
        Ok(keys)
    }

    pub async fn has_submission(&self, user_id: i64, quiz_id: i64) -> Result<bool, BotError> {
        let row = sqlx::query("SELECT 1 FROM submissions WHERE user_id = ? AND quiz_id = ?")
            .bind(user_id)
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn save_submission(
        &self,
        user_id: i64,
        quiz_id: i64,
        answer_text: &str,
        submitted_at: DateTime<FixedOffset>,
    ) -> Result<(), BotError> {
        sqlx::query(
            "INSERT INTO submissions (user_id, quiz_id, answer_text, submitted_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(quiz_id)
        .bind(answer_text)
        .bind(submitted_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn submissions_with_participants(
        &self,
        quiz_id: i64,
    ) -> Result<Vec<SubmissionRow>, BotError> {
        let rows = sqlx::query(
            "SELECT s.user_id, u.full_name, u.username, s.submitted_at, s.answer_text
             FROM submissions s
             LEFT JOIN users u ON u.user_id = s.user_id
             WHERE s.quiz_id = ?
             ORDER BY s.user_id, s.submitted_at",
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        let mut submissions = Vec::with_capacity(rows.len());
        for row in rows {
            submissions.push(SubmissionRow {
                user_id: row.try_get("user_id")?,
                full_name: row.try_get("full_name")?,
                username: row.try_get("username")?,
                submitted_at: parse_instant(row.try_get("submitted_at")?)?,
                answer_text: row.try_get("answer_text")?,
            });
        }
        Ok(submissions)
    }

    pub async fn submission_text(
        &self,
        quiz_id: i64,
        user_id: i64,
    ) -> Result<Option<String>, BotError> {
        let row = sqlx::query("SELECT answer_text FROM submissions WHERE quiz_id = ? AND user_id = ?")
            .bind(quiz_id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get("answer_text")?)),
            None => Ok(None),
        }
    }

    pub async fn submissions_by_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<(String, DateTime<FixedOffset>, String)>, BotError> {
        let rows = sqlx::query(
            "SELECT q.title, s.submitted_at, s.answer_text
             FROM submissions s
             JOIN quizzes q ON q.quiz_id = s.quiz_id
             WHERE s.user_id = ?
             ORDER BY s.submitted_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        let mut submissions = Vec::with_capacity(rows.len());
        for row in rows {
            submissions.push((
                row.try_get("title")?,
                parse_instant(row.try_get("submitted_at")?)?,
                row.try_get("answer_text")?,
            ));
        }
        Ok(submissions)
    }
}

fn parse_instant(raw: String) -> Result<DateTime<FixedOffset>, BotError> {
    Ok(DateTime::parse_from_rfc3339(&raw)?)
}

fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CODE_CHARSET[rng.gen_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn open() -> Db {
        // a single connection keeps the whole test on one in-memory database
        let options = SqliteConnectOptions::from_str("sqlite::memory:").unwrap();
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let db = Db { pool };
        db.migrate().await.unwrap();
        db
    }

    fn at(hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 7, 7, hour, 0, 0)
            .unwrap()
    }

    fn question(number: u32, answer: &str, weight: f64) -> QuestionKey {
        QuestionKey { number, answer: answer.into(), weight }
    }

    #[tokio::test]
    async fn users_are_upserted_and_named() {
        let db = open().await;
        db.upsert_user(7, Some("alice"), at(9)).await.unwrap();
        assert_eq!(db.full_name(7).await.unwrap(), None);

        db.set_full_name(7, "IVANOVA ALICE").await.unwrap();
        db.upsert_user(7, Some("alice_renamed"), at(10)).await.unwrap();
        assert_eq!(db.full_name(7).await.unwrap().as_deref(), Some("IVANOVA ALICE"));
    }

    #[tokio::test]
    async fn admin_roster_gates_and_owner_bypasses() {
        let db = open().await;
        assert!(!db.is_admin_or_owner(3, 1).await.unwrap());
        assert!(db.is_admin_or_owner(1, 1).await.unwrap());

        db.add_admin(3, at(9)).await.unwrap();
        db.add_admin(3, at(9)).await.unwrap();
        assert!(db.is_admin(3).await.unwrap());
        assert_eq!(db.admin_ids().await.unwrap(), vec![3]);

        db.remove_admin(3).await.unwrap();
        assert!(!db.is_admin_or_owner(3, 1).await.unwrap());
    }

    #[tokio::test]
    async fn generated_codes_use_the_uppercase_alphanumeric_charset() {
        let db = open().await;
        let code = db.generate_code(6).await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| CODE_CHARSET.contains(&b)));
    }

    #[tokio::test]
    async fn quizzes_round_trip_through_code_lookup() {
        let db = open().await;
        let quiz_id = db.create_quiz("Algebra", "AB12CD", 1, at(18), at(9)).await.unwrap();
        db.add_question(quiz_id, &question(2, "0.667", 2.5)).await.unwrap();
        db.add_question(quiz_id, &question(1, "a", 1.0)).await.unwrap();

        let found = db.find_quiz_by_code("AB12CD").await.unwrap().unwrap();
        assert_eq!(found.quiz_id, quiz_id);
        assert_eq!(found.deadline, at(18));
        assert!(db.find_quiz_by_code("ZZZZZZ").await.unwrap().is_none());

        // keys come back ordered by question number regardless of insert order
        let keys = db.question_keys(quiz_id).await.unwrap();
        assert_eq!(keys, vec![question(1, "a", 1.0), question(2, "0.667", 2.5)]);
    }

    #[tokio::test]
    async fn submission_checks_stay_true_once_saved() {
        let db = open().await;
        let quiz_id = db.create_quiz("Algebra", "AB12CD", 1, at(18), at(9)).await.unwrap();

        assert!(!db.has_submission(7, quiz_id).await.unwrap());
        db.save_submission(7, quiz_id, "1 a", at(10)).await.unwrap();
        assert!(db.has_submission(7, quiz_id).await.unwrap());
        assert!(db.has_submission(7, quiz_id).await.unwrap());

        assert_eq!(
            db.submission_text(quiz_id, 7).await.unwrap().as_deref(),
            Some("1 a")
        );
    }

    #[tokio::test]
    async fn submissions_join_participant_info() {
        let db = open().await;
        let quiz_id = db.create_quiz("Algebra", "AB12CD", 1, at(18), at(9)).await.unwrap();
        db.upsert_user(7, Some("alice"), at(9)).await.unwrap();
        db.set_full_name(7, "IVANOVA ALICE").await.unwrap();
        db.save_submission(7, quiz_id, "1 a", at(10)).await.unwrap();

        let rows = db.submissions_with_participants(quiz_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].full_name.as_deref(), Some("IVANOVA ALICE"));
        assert_eq!(rows[0].username.as_deref(), Some("alice"));
        assert_eq!(rows[0].submitted_at, at(10));

        let mine = db.submissions_by_user(7).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].0, "Algebra");
    }

    #[tokio::test]
    async fn deleting_a_quiz_removes_its_questions_and_submissions() {
        let db = open().await;
        let quiz_id = db.create_quiz("Algebra", "AB12CD", 1, at(18), at(9)).await.unwrap();
        db.add_question(quiz_id, &question(1, "a", 1.0)).await.unwrap();
        db.save_submission(7, quiz_id, "1 a", at(10)).await.unwrap();

        db.delete_quiz(quiz_id).await.unwrap();
        assert!(db.quiz_overview(quiz_id).await.unwrap().is_none());
        assert!(db.question_keys(quiz_id).await.unwrap().is_empty());
        assert!(!db.has_submission(7, quiz_id).await.unwrap());
    }

    #[tokio::test]
    async fn overview_counts_submissions() {
        let db = open().await;
        let quiz_id = db.create_quiz("Algebra", "AB12CD", 1, at(18), at(9)).await.unwrap();
        db.add_question(quiz_id, &question(1, "a", 1.0)).await.unwrap();
        db.save_submission(7, quiz_id, "1 a", at(10)).await.unwrap();
        db.save_submission(8, quiz_id, "1 b", at(11)).await.unwrap();

        let overview = db.quiz_overview(quiz_id).await.unwrap().unwrap();
        assert_eq!(overview.title, "Algebra");
        assert_eq!(overview.code, "AB12CD");
        assert_eq!(overview.submissions, 2);
        assert_eq!(overview.questions.len(), 1);
    }
}
