//! Student attendance records
//!
//! Admins read every student's history through the users endpoint, teachers
//! through their own records endpoint. Everything past the fetch (search,
//! per-subject summaries, paging) is computed locally.

use hajiri_common::api::auth::Role;
use hajiri_common::api::types::{AttendanceEntry, ListResponse, StudentRecord};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::http::{ApiClient, Query};

pub const ADMIN_RECORDS_PATH: &str = "/accounts/api/users/?role=student";
pub const TEACHER_RECORDS_PATH: &str = "/api/teacher/student-records/";
/// Students see the users endpoint scoped to themselves by the backend
pub const OWN_RECORDS_PATH: &str = "/accounts/api/users/";

/// Attendance rows shown per page
pub const PAGE_SIZE: usize = 10;

/// Which endpoint serves the records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordsSource {
    AdminStudents,
    TeacherStudents,
}

impl RecordsSource {
    /// `None` for roles that may not browse other students' records
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Admin => Some(RecordsSource::AdminStudents),
            Role::Teacher => Some(RecordsSource::TeacherStudents),
            Role::Student | Role::Anonymous => None,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            RecordsSource::AdminStudents => ADMIN_RECORDS_PATH,
            RecordsSource::TeacherStudents => TEACHER_RECORDS_PATH,
        }
    }
}

/// Server-side filters; blank values are not sent
#[derive(Debug, Clone, Default)]
pub struct RecordsFilter {
    pub class_id: Option<i64>,
    pub subject_id: Option<i64>,
    pub date: Option<chrono::NaiveDate>,
    pub status: Option<String>,
    pub name: Option<String>,
    pub roll_number: Option<String>,
}

impl RecordsFilter {
    fn to_query(&self) -> Query {
        let text = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Query::new()
            .with_opt("class_id", self.class_id)
            .with_opt("subject_id", self.subject_id)
            .with_opt("date", self.date.map(|d| d.format("%Y-%m-%d").to_string()))
            .with_opt("status", text(&self.status))
            .with_opt("name", text(&self.name))
            .with_opt("roll_number", text(&self.roll_number))
    }
}

/// Attendance counts for one subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubjectSummary {
    pub present: u32,
    pub absent: u32,
    pub total: u32,
}

/// Colour band of an attendance percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceTier {
    Good,
    Warning,
    Poor,
}

impl SubjectSummary {
    /// Whole percentage attended, rounded half up; 0 with no sessions
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (self.present * 200 + self.total) / (2 * self.total)
    }

    pub fn tier(&self) -> AttendanceTier {
        match self.percent() {
            p if p >= 75 => AttendanceTier::Good,
            p if p >= 50 => AttendanceTier::Warning,
            _ => AttendanceTier::Poor,
        }
    }
}

/// Count attended and missed days per subject label
///
/// Anything other than `present` / `manual-present` counts as absent.
pub fn summarize_by_subject(attendance: &[AttendanceEntry]) -> BTreeMap<String, SubjectSummary> {
    let mut summary: BTreeMap<String, SubjectSummary> = BTreeMap::new();
    for entry in attendance {
        let stats = summary.entry(entry.subject_label()).or_default();
        if entry.is_present() {
            stats.present += 1;
        } else {
            stats.absent += 1;
        }
        stats.total += 1;
    }
    summary
}

/// Local search by name (case-insensitive) or roll number substring
pub fn search<'a>(records: &'a [StudentRecord], term: &str) -> Vec<&'a StudentRecord> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|r| {
            let by_name = r
                .name
                .as_deref()
                .map_or(false, |n| n.to_lowercase().contains(&term));
            let by_roll = r
                .roll_number
                .as_deref()
                .map_or(false, |n| n.contains(&term));
            by_name || by_roll
        })
        .collect()
}

/// One page of a student's attendance
#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// 1-based
    pub number: usize,
    pub total_pages: usize,
}

/// Slice out page `number` (1-based), clamped into range
pub fn paginate<T>(items: &[T], number: usize) -> Page<'_, T> {
    let total_pages = items.len().div_ceil(PAGE_SIZE).max(1);
    let number = number.clamp(1, total_pages);
    let start = ((number - 1) * PAGE_SIZE).min(items.len());
    let end = (start + PAGE_SIZE).min(items.len());

    Page {
        items: &items[start..end],
        number,
        total_pages,
    }
}

/// Records service
pub struct RecordsService {
    api: Arc<ApiClient>,
}

impl RecordsService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    pub async fn fetch(
        &self,
        source: RecordsSource,
        filter: &RecordsFilter,
    ) -> ClientResult<Vec<StudentRecord>> {
        let list: ListResponse<StudentRecord> =
            self.api.get(source.path(), &filter.to_query()).await?;
        let records = list.into_items();
        tracing::debug!(source = ?source, count = records.len(), "Fetched student records");
        Ok(records)
    }

    /// The signed-in student's own history, located by email
    pub async fn own_record(&self, email: &str) -> ClientResult<StudentRecord> {
        let list: ListResponse<StudentRecord> =
            self.api.get(OWN_RECORDS_PATH, &Query::new()).await?;

        list.into_items()
            .into_iter()
            .find(|r| r.email.as_deref().map_or(false, |e| e.eq_ignore_ascii_case(email)))
            .ok_or_else(|| ClientError::Validation("No attendance records found".to_string()))
    }
}
