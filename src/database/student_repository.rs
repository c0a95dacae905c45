use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::error::AppResult;
use crate::ingest::traits::StudentDirectory;

/// Student (fee account) entity. Balance is positive when fees are owed and
/// is only ever mutated by the ledger writer.
#[derive(Debug, Clone, FromRow)]
pub struct Student {
    pub id: Uuid,
    pub school_id: Uuid,
    pub admission_number: String,
    pub name: String,
    pub class_level: String,
    pub guardian_name: String,
    pub guardian_phone: String,
    pub current_balance: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const STUDENT_COLUMNS: &str = "id, school_id, admission_number, name, class_level, \
     guardian_name, guardian_phone, current_balance, status, created_at, updated_at";

/// Repository for student lookups. Admission numbers are stored uppercase;
/// callers pass an already-normalized reference.
pub struct StudentRepository {
    pool: PgPool,
}

impl StudentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>, DatabaseError> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {} FROM students WHERE id = $1",
            STUDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_reference(
        &self,
        school_id: Uuid,
        reference: &str,
    ) -> Result<Option<Student>, DatabaseError> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {} FROM students WHERE school_id = $1 AND admission_number = $2",
            STUDENT_COLUMNS
        ))
        .bind(school_id)
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Cross-school lookup for channels that are tenant-agnostic at the
    /// wire level. Admission numbers are only unique per school; when two
    /// schools share a code the oldest enrollment wins. See DESIGN.md.
    pub async fn find_by_reference_global(
        &self,
        reference: &str,
    ) -> Result<Option<Student>, DatabaseError> {
        sqlx::query_as::<_, Student>(&format!(
            "SELECT {} FROM students WHERE admission_number = $1 ORDER BY created_at ASC LIMIT 1",
            STUDENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}

#[async_trait]
impl StudentDirectory for StudentRepository {
    async fn find_by_reference(
        &self,
        school_id: Uuid,
        reference: &str,
    ) -> AppResult<Option<Student>> {
        Ok(StudentRepository::find_by_reference(self, school_id, reference).await?)
    }

    async fn find_by_reference_global(&self, reference: &str) -> AppResult<Option<Student>> {
        Ok(StudentRepository::find_by_reference_global(self, reference).await?)
    }
}
