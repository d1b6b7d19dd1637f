//! Attendance session negotiation
//!
//! Looks up an open session for a class-subject pair before creating one, so
//! repeated invocations converge on the same backend session row instead of
//! piling up duplicates.

use hajiri_common::api::types::{
    ClassSubjectId, CreateSessionRequest, CreateSessionResponse, OpenSessionResponse, SessionId,
    SessionStatus,
};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::http::{ApiClient, Query};

pub const OPEN_SESSION_PATH: &str = "/api/attendance/session/open/";
pub const CREATE_SESSION_PATH: &str = "/api/attendance/session/create/";

/// How a session came to be used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    /// An open session already existed and was reused
    Existing,
    /// No open session existed; this call created one
    Created,
}

/// What the caller asks for when starting attendance
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    pub class_subject_id: ClassSubjectId,
    pub title: String,
    pub is_manual_allowed: bool,
}

/// A session the controller can take attendance in
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSession {
    pub id: SessionId,
    pub class_subject_id: ClassSubjectId,
    /// Known only for sessions created by this call
    pub title: Option<String>,
    /// Known only for sessions created by this call
    pub is_manual_allowed: Option<bool>,
    pub status: SessionStatus,
    pub origin: SessionOrigin,
}

/// Finds or creates the open session for a class-subject pair
pub struct SessionNegotiator {
    api: Arc<ApiClient>,
}

impl SessionNegotiator {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Id of the open session for `class_subject_id`, if any
    ///
    /// An empty body, `null`, an object without `session_id`, or a 404 all
    /// mean there is none.
    pub async fn find_open(&self, class_subject_id: ClassSubjectId) -> ClientResult<Option<SessionId>> {
        let query = Query::new().with("class_subject_id", class_subject_id);

        let value = match self.api.get_value(OPEN_SESSION_PATH, &query).await {
            Ok(value) => value,
            Err(ClientError::Api { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        if value.is_null() {
            return Ok(None);
        }
        if let Value::Object(ref map) = value {
            if map.is_empty() {
                return Ok(None);
            }
        }

        let response: OpenSessionResponse =
            serde_json::from_value(value).map_err(|e| ClientError::Parse(e.to_string()))?;
        Ok(response.session_id)
    }

    /// Ask the backend for a new session
    pub async fn create(&self, request: &SessionRequest) -> ClientResult<SessionId> {
        let body = CreateSessionRequest {
            class_subject_id: request.class_subject_id,
            session_title: request.title.clone(),
            is_manual_allowed: request.is_manual_allowed,
        };

        let response: Option<CreateSessionResponse> =
            self.api.post(CREATE_SESSION_PATH, &body).await?;
        let response = response.unwrap_or_default();

        match response.session_id {
            Some(id) => Ok(id),
            None => Err(ClientError::Rejected(
                response
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| "Failed to create session".to_string()),
            )),
        }
    }

    /// Reuse the open session if one exists, otherwise create it
    pub async fn negotiate(&self, request: &SessionRequest) -> ClientResult<AttendanceSession> {
        if let Some(id) = self.find_open(request.class_subject_id).await? {
            tracing::info!(
                session_id = %id,
                class_subject_id = %request.class_subject_id,
                "Reusing open attendance session"
            );
            return Ok(AttendanceSession {
                id,
                class_subject_id: request.class_subject_id,
                title: None,
                is_manual_allowed: None,
                status: SessionStatus::Open,
                origin: SessionOrigin::Existing,
            });
        }

        let id = self.create(request).await?;
        tracing::info!(
            session_id = %id,
            class_subject_id = %request.class_subject_id,
            manual_allowed = request.is_manual_allowed,
            "Created attendance session"
        );

        Ok(AttendanceSession {
            id,
            class_subject_id: request.class_subject_id,
            title: Some(request.title.clone()),
            is_manual_allowed: Some(request.is_manual_allowed),
            status: SessionStatus::Open,
            origin: SessionOrigin::Created,
        })
    }
}
