//! Backend-facing services
//!
//! The attendance pieces (negotiator, capture, controller) form the core;
//! the remaining services are thin wrappers over the admin and records
//! endpoints.

pub mod academics;
pub mod accounts;
pub mod attendance_session;
pub mod capture;
pub mod dashboard;
pub mod records;
pub mod session_negotiator;

pub use academics::AcademicsService;
pub use accounts::{AccountsService, LoginOutcome, RegistrationForm};
pub use attendance_session::{AttendanceController, ManualOutcome, Notice, NoticeKind};
pub use capture::{FileFrameSource, FrameSource};
pub use dashboard::{DashboardService, Destination, OverviewStats};
pub use records::{RecordsService, RecordsSource};
pub use session_negotiator::{AttendanceSession, SessionNegotiator, SessionOrigin, SessionRequest};
