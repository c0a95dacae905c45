//! Student (account) matching
//!
//! Payer-supplied references are free text; people type spaces and
//! lowercase. Normalize first, then look up scoped to the resolved school,
//! or across all schools for channels that resolve the tenant through the
//! match itself. Absence is not an error here: the pipeline routes it to
//! suspense.

use std::sync::Arc;

use crate::database::student_repository::Student;
use crate::error::AppResult;
use crate::ingest::resolver::TenantScope;
use crate::ingest::traits::StudentDirectory;

/// Trim surrounding whitespace and uppercase-fold, matching how admission
/// numbers are stored.
pub fn normalize_reference(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub struct StudentMatcher {
    students: Arc<dyn StudentDirectory>,
}

impl StudentMatcher {
    pub fn new(students: Arc<dyn StudentDirectory>) -> Self {
        Self { students }
    }

    /// Look up the student a normalized reference points at.
    pub async fn match_student(
        &self,
        scope: &TenantScope,
        reference: &str,
    ) -> AppResult<Option<Student>> {
        match scope {
            TenantScope::Resolved(school) => {
                self.students.find_by_reference(school.id, reference).await
            }
            TenantScope::Unresolved => self.students.find_by_reference_global(reference).await,
        }
    }
}
