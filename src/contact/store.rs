use sqlx::{FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::submission::{ContactSubmission, NewSubmission, SubmissionStatus};

const COLUMNS: &str =
    "id,name,email,phone,company,project_type,budget_range,message,user_id,status,created_at";

#[derive(FromRow)]
struct SubmissionRow {
    id: String,
    name: String,
    email: String,
    phone: Option<String>,
    company: Option<String>,
    project_type: Option<String>,
    budget_range: Option<String>,
    message: String,
    user_id: Option<String>,
    status: String,
    created_at: OffsetDateTime,
}

impl TryFrom<SubmissionRow> for ContactSubmission {
    type Error = sqlx::Error;

    fn try_from(row: SubmissionRow) -> Result<Self, Self::Error> {
        fn decode<T, E>(column: &str, parsed: Result<T, E>) -> Result<T, sqlx::Error>
        where
            E: std::error::Error + Send + Sync + 'static,
        {
            parsed.map_err(|err| sqlx::Error::ColumnDecode {
                index: column.to_owned(),
                source: Box::new(err),
            })
        }

        Ok(ContactSubmission {
            id: decode("id", Uuid::parse_str(&row.id))?,
            name: row.name,
            email: row.email,
            phone: row.phone,
            company: row.company,
            project_type: row.project_type.map(|v| decode("project_type", v.parse())).transpose()?,
            budget_range: row.budget_range.map(|v| decode("budget_range", v.parse())).transpose()?,
            message: row.message,
            user_id: row.user_id,
            status: decode("status", row.status.parse())?,
            created_at: row.created_at,
        })
    }
}

/// Contact submissions persisted in the `contact_submissions` table.
#[derive(Clone)]
pub struct SubmissionStore {
    db_pool: SqlitePool,
}

impl SubmissionStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db_pool
    }

    pub async fn insert(
        &self,
        submission: &NewSubmission,
    ) -> Result<ContactSubmission, sqlx::Error> {
        let id = Uuid::now_v7();
        let row: SubmissionRow = sqlx::query_as(&format!(
            "INSERT INTO contact_submissions ({COLUMNS}) \
             VALUES (?,?,?,?,?,?,?,?,?,?,?) RETURNING {COLUMNS}"
        ))
            .bind(id.to_string())
            .bind(&submission.name)
            .bind(&submission.email)
            .bind(&submission.phone)
            .bind(&submission.company)
            .bind(submission.project_type.map(|v| v.as_str()))
            .bind(submission.budget_range.map(|v| v.as_str()))
            .bind(&submission.message)
            .bind(&submission.user_id)
            .bind(SubmissionStatus::New.as_str())
            .bind(OffsetDateTime::now_utc())
            .fetch_one(&self.db_pool)
            .await?;

        row.try_into()
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<ContactSubmission>, sqlx::Error> {
        sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {COLUMNS} FROM contact_submissions WHERE id=?"
        ))
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// All submissions, newest first.
    pub async fn list(&self) -> Result<Vec<ContactSubmission>, sqlx::Error> {
        sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {COLUMNS} FROM contact_submissions ORDER BY created_at DESC, id DESC"
        ))
            .fetch_all(&self.db_pool)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    /// Returns `None` when no submission has this id.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: SubmissionStatus,
    ) -> Result<Option<ContactSubmission>, sqlx::Error> {
        sqlx::query_as::<_, SubmissionRow>(&format!(
            "UPDATE contact_submissions SET status=? WHERE id=? RETURNING {COLUMNS}"
        ))
            .bind(status.as_str())
            .bind(id.to_string())
            .fetch_optional(&self.db_pool)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    /// Returns whether a row was removed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM contact_submissions WHERE id=?")
            .bind(id.to_string())
            .execute(&self.db_pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
