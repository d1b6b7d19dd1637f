//! Teacher-facing live attendance session
//!
//! The controller holds the view state of one attendance screen: the
//! negotiated session, the current mode, the last recognition result and the
//! last notification. Sequence: no session → session open →
//! (capture-and-recognize | manual mark)*. Nothing closes a session here.
//!
//! Every failure leaves the controller usable; nothing is retried.

use hajiri_common::api::types::{
    AttendanceMode, CaptureBatch, ClassSubjectId, ManualMark, ManualMarkResponse,
    RecognizeResponse, RecognizedIdentity, SessionId,
};
use hajiri_common::config::CaptureConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::services::capture::{capture_burst, FrameSource};
use crate::services::session_negotiator::{
    AttendanceSession, SessionNegotiator, SessionOrigin, SessionRequest,
};

pub const RECOGNIZE_PATH: &str = "/api/attendance/recognize/";
pub const MANUAL_MARK_PATH: &str = "/api/attendance/manual/";

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Danger,
}

/// Transient user-visible message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn from_error(err: &ClientError) -> Self {
        Self::new(NoticeKind::Danger, err.to_string())
    }
}

/// Backend verdict on a manual mark
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualOutcome {
    pub success: bool,
    pub message: String,
}

#[derive(Debug)]
struct ViewState {
    session: Option<AttendanceSession>,
    mode: AttendanceMode,
    is_manual_allowed: bool,
    recognized: Vec<RecognizedIdentity>,
    notice: Option<Notice>,
}

/// Clears the capturing flag however the cycle ends
struct CapturingGuard<'a>(&'a AtomicBool);

impl Drop for CapturingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One attendance screen for one class-subject pair
pub struct AttendanceController {
    api: Arc<ApiClient>,
    negotiator: SessionNegotiator,
    class_subject_id: ClassSubjectId,
    title: String,
    capture: CaptureConfig,
    state: RwLock<ViewState>,
    capturing: AtomicBool,
}

impl AttendanceController {
    pub fn new(
        api: Arc<ApiClient>,
        class_subject_id: ClassSubjectId,
        title: impl Into<String>,
        capture: CaptureConfig,
    ) -> Self {
        Self {
            negotiator: SessionNegotiator::new(Arc::clone(&api)),
            api,
            class_subject_id,
            title: title.into(),
            capture,
            state: RwLock::new(ViewState {
                session: None,
                mode: AttendanceMode::Entry,
                is_manual_allowed: true,
                recognized: Vec::new(),
                notice: None,
            }),
            capturing: AtomicBool::new(false),
        }
    }

    pub fn class_subject_id(&self) -> ClassSubjectId {
        self.class_subject_id
    }

    pub async fn session(&self) -> Option<AttendanceSession> {
        self.state.read().await.session.clone()
    }

    pub async fn session_id(&self) -> Option<SessionId> {
        self.state.read().await.session.as_ref().map(|s| s.id)
    }

    pub async fn mode(&self) -> AttendanceMode {
        self.state.read().await.mode
    }

    pub async fn set_mode(&self, mode: AttendanceMode) {
        self.state.write().await.mode = mode;
    }

    /// Manual-entry flag sent when a new session gets created
    pub async fn set_manual_allowed(&self, allowed: bool) {
        self.state.write().await.is_manual_allowed = allowed;
    }

    pub async fn recognized(&self) -> Vec<RecognizedIdentity> {
        self.state.read().await.recognized.clone()
    }

    pub async fn notice(&self) -> Option<Notice> {
        self.state.read().await.notice.clone()
    }

    pub async fn dismiss_notice(&self) {
        self.state.write().await.notice = None;
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    async fn set_notice(&self, notice: Notice) {
        self.state.write().await.notice = Some(notice);
    }

    async fn require_session(&self) -> ClientResult<SessionId> {
        match self.session_id().await {
            Some(id) => Ok(id),
            None => {
                let err = ClientError::NoActiveSession;
                self.set_notice(Notice::from_error(&err)).await;
                Err(err)
            }
        }
    }

    /// Find or create the session; once known it is kept for this controller
    pub async fn start_session(&self) -> ClientResult<SessionId> {
        if let Some(id) = self.session_id().await {
            return Ok(id);
        }

        let request = SessionRequest {
            class_subject_id: self.class_subject_id,
            title: self.title.clone(),
            is_manual_allowed: self.state.read().await.is_manual_allowed,
        };

        match self.negotiator.negotiate(&request).await {
            Ok(session) => {
                let id = session.id;
                let notice = match session.origin {
                    SessionOrigin::Created => {
                        Notice::new(NoticeKind::Success, "Session created successfully!")
                    }
                    SessionOrigin::Existing => {
                        Notice::new(NoticeKind::Info, format!("Resumed open session #{}", id))
                    }
                };

                let mut state = self.state.write().await;
                state.session = Some(session);
                state.notice = Some(notice);
                Ok(id)
            }
            Err(err) => {
                tracing::warn!(
                    class_subject_id = %self.class_subject_id,
                    error = %err,
                    "Could not start attendance session"
                );
                self.set_notice(Notice::from_error(&err)).await;
                Err(err)
            }
        }
    }

    /// Capture a burst from `camera` and submit it for recognition
    ///
    /// On success the recognized list is replaced, never merged. On failure
    /// the previous list is left as it was.
    pub async fn capture_and_recognize(
        &self,
        camera: &mut dyn FrameSource,
    ) -> ClientResult<Vec<RecognizedIdentity>> {
        let session_id = self.require_session().await?;

        if self
            .capturing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClientError::CaptureInProgress);
        }
        let _guard = CapturingGuard(&self.capturing);

        let images = capture_burst(camera, &self.capture).await;
        let batch = CaptureBatch {
            session_id,
            images,
            mode: self.mode().await,
        };

        tracing::info!(
            session_id = %session_id,
            frames = batch.images.len(),
            mode = %batch.mode,
            "Submitting frames for recognition"
        );

        let result: ClientResult<Option<RecognizeResponse>> =
            self.api.post(RECOGNIZE_PATH, &batch).await;

        match result {
            Ok(response) => {
                let recognized = response.unwrap_or_default().recognized;
                tracing::info!(
                    session_id = %session_id,
                    recognized = recognized.len(),
                    "Recognition complete"
                );

                let mut state = self.state.write().await;
                state.recognized = recognized.clone();
                state.notice = Some(Notice::new(NoticeKind::Info, "Recognition complete."));
                Ok(recognized)
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "Recognition failed");
                self.set_notice(Notice::from_error(&err)).await;
                Err(err)
            }
        }
    }

    /// Mark one student directly, bypassing recognition
    ///
    /// The recognized list is not touched; the only visible effect is the
    /// notice carrying the backend's message.
    pub async fn mark_manual(
        &self,
        roll_number: &str,
        mode: AttendanceMode,
    ) -> ClientResult<ManualOutcome> {
        let session_id = self.require_session().await?;

        let roll_number = roll_number.trim();
        if roll_number.is_empty() {
            let err = ClientError::Validation("Roll number is required".to_string());
            self.set_notice(Notice::from_error(&err)).await;
            return Err(err);
        }

        let mark = ManualMark {
            session_id,
            roll_number: roll_number.to_string(),
            mode,
        };

        let result: ClientResult<Option<ManualMarkResponse>> =
            self.api.post(MANUAL_MARK_PATH, &mark).await;

        match result {
            Ok(response) => {
                let response = response.unwrap_or_default();
                let success = response.success.unwrap_or(false);
                let message = response
                    .message
                    .filter(|m| !m.is_empty())
                    .or(response.error.filter(|e| !e.is_empty()))
                    .unwrap_or_else(|| "Action completed".to_string());

                tracing::info!(
                    session_id = %session_id,
                    roll_number = %mark.roll_number,
                    mode = %mode,
                    success,
                    "Manual mark submitted"
                );

                let kind = if success {
                    NoticeKind::Success
                } else {
                    NoticeKind::Danger
                };
                self.set_notice(Notice::new(kind, message.clone())).await;
                Ok(ManualOutcome { success, message })
            }
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "Manual marking failed");
                self.set_notice(Notice::from_error(&err)).await;
                Err(err)
            }
        }
    }
}
