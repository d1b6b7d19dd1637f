//! Request/response types for the Sajilo Hajiri backend
//!
//! Field names follow the backend's JSON exactly; identifiers the attendance
//! workflow passes around get newtypes so a session id can never be handed to
//! a call expecting a class-subject id.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::api::auth::{ApprovalStatus, Role};
use crate::Error;

// ========================================
// Identifiers
// ========================================

/// Backend identifier of an attendance session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub i64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend identifier of a class-subject pairing (a teacher assignment)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassSubjectId(pub i64);

impl fmt::Display for ClassSubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ========================================
// Attendance
// ========================================

/// Whether a mark records arrival or departure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceMode {
    #[default]
    Entry,
    Exit,
}

impl AttendanceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceMode::Entry => "entry",
            AttendanceMode::Exit => "exit",
        }
    }
}

impl fmt::Display for AttendanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttendanceMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entry" => Ok(AttendanceMode::Entry),
            "exit" => Ok(AttendanceMode::Exit),
            other => Err(Error::Validation(format!(
                "Unknown attendance mode '{}' (expected entry or exit)",
                other
            ))),
        }
    }
}

/// Session lifecycle as tracked by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Open,
    Closed,
}

/// `GET /api/attendance/session/open/` response body
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OpenSessionResponse {
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// `POST /api/attendance/session/create/` request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSessionRequest {
    pub class_subject_id: ClassSubjectId,
    pub session_title: String,
    pub is_manual_allowed: bool,
}

/// `POST /api/attendance/session/create/` response body
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CreateSessionResponse {
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One burst of frames submitted to the recognition endpoint
///
/// Frames are bare base64 JPEG payloads with any data-URL prefix removed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureBatch {
    pub session_id: SessionId,
    pub images: Vec<String>,
    pub mode: AttendanceMode,
}

/// `POST /api/attendance/recognize/` response body
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RecognizeResponse {
    #[serde(default)]
    pub recognized: Vec<RecognizedIdentity>,
}

/// A student matched by the recognition backend
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecognizedIdentity {
    pub student_id: i64,
    pub name: String,
    pub mode: AttendanceMode,
    pub status: String,
}

impl RecognizedIdentity {
    pub fn is_present(&self) -> bool {
        self.status == "present"
    }
}

/// `POST /api/attendance/manual/` request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManualMark {
    pub session_id: SessionId,
    pub roll_number: String,
    pub mode: AttendanceMode,
}

/// `POST /api/attendance/manual/` response body
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ManualMarkResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ========================================
// Academics
// ========================================

/// A class (batch of students in one semester of a department)
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Class {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub semester: i32,
    pub department: String,
}

/// Writable fields of a class
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassPayload {
    pub name: String,
    pub year: i32,
    pub semester: i32,
    pub department: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Subject {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// Writable fields of a subject
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubjectPayload {
    pub name: String,
    pub code: String,
}

/// A teacher assigned to teach a subject to a class
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassSubject {
    pub id: ClassSubjectId,
    pub class_instance: i64,
    pub subject: i64,
    pub teacher: i64,
}

/// `POST /api/admin/assign-teacher/` request body
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AssignTeacherRequest {
    pub teacher: i64,
    pub class_instance: i64,
    pub subject: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Enrollment {
    pub id: i64,
    pub student: i64,
    pub enrolled_class: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EnrollRequest {
    pub student: i64,
    pub enrolled_class: i64,
}

// ========================================
// Accounts
// ========================================

/// A user account as listed by `/accounts/api/users/`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default, deserialize_with = "string_or_number")]
    pub roll_number: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub semester: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl User {
    /// Name shown in lists, falling back to the email address
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.email)
    }
}

/// Admin-side create/update payload for a user
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct UserPayload {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// `POST /api/token/` request body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    pub email: String,
    pub password: String,
}

/// `POST /api/token/` response body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenPair {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Admin decision on a pending registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Unapprove,
}

impl FromStr for ApprovalAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ApprovalAction::Approve),
            "unapprove" => Ok(ApprovalAction::Unapprove),
            other => Err(Error::Validation(format!(
                "Unknown approval action '{}' (expected approve or unapprove)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub email: String,
    pub action: ApprovalAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub email: String,
    pub feedback: String,
}

// ========================================
// Records
// ========================================

/// One student's attendance history as returned by the records endpoints
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StudentRecord {
    #[serde(default)]
    pub student_id: Option<i64>,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub roll_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub attendance: Vec<AttendanceEntry>,
}

impl StudentRecord {
    /// Key used to track per-student view state
    pub fn key(&self) -> Option<i64> {
        self.student_id.or(self.id)
    }
}

/// One day's attendance for one subject
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AttendanceEntry {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub subject_code: Option<String>,
    #[serde(default)]
    pub entry_status: Option<String>,
    #[serde(default)]
    pub exit_status: Option<String>,
}

impl AttendanceEntry {
    /// Subject label, with the code appended when known
    pub fn subject_label(&self) -> String {
        let subject = self.subject.as_deref().unwrap_or("Unknown");
        match self.subject_code.as_deref() {
            Some(code) if !code.is_empty() => format!("{} ({})", subject, code),
            _ => subject.to_string(),
        }
    }

    /// `present` and `manual-present` both count as attended
    pub fn is_present(&self) -> bool {
        matches!(
            self.entry_status.as_deref(),
            Some("present") | Some("manual-present")
        )
    }
}

/// List endpoints may answer with a bare array or a paginated envelope
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Items(Vec<T>),
    Paged { results: Vec<T> },
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Items(items) => items,
            ListResponse::Paged { results } => results,
        }
    }
}

/// Accept `"221506"` and `221506` alike
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
