//! Post-login routing and the admin overview

use hajiri_common::api::auth::{ApprovalStatus, Claims, Role};
use hajiri_common::api::types::{Class, ClassSubject, Enrollment, ListResponse, Subject, User};
use std::sync::Arc;

use crate::error::ClientResult;
use crate::http::{ApiClient, Query};
use crate::services::academics::{
    CLASSES_PATH, CLASS_SUBJECTS_PATH, ENROLLMENTS_PATH, SUBJECTS_PATH,
};
use crate::services::accounts::USERS_PATH;

/// Screen a signed-in user is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    AdminPanel,
    TeacherDashboard,
    StudentDashboard,
    /// Pending or unapproved accounts must revise their registration
    UpdateRegistration,
    Login,
}

impl Destination {
    pub fn resolve(role: Role, approval: ApprovalStatus) -> Self {
        match role {
            Role::Admin => Destination::AdminPanel,
            Role::Teacher | Role::Student if approval.needs_update() => {
                Destination::UpdateRegistration
            }
            Role::Teacher => Destination::TeacherDashboard,
            Role::Student => Destination::StudentDashboard,
            Role::Anonymous => Destination::Login,
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Destination::AdminPanel => "/admin",
            Destination::TeacherDashboard | Destination::StudentDashboard => "/dashboard",
            Destination::UpdateRegistration => "/register",
            Destination::Login => "/login",
        }
    }
}

/// Counts shown on the admin panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverviewStats {
    pub users: usize,
    pub teachers: usize,
    pub students: usize,
    pub classes: usize,
    pub subjects: usize,
    pub enrollments: usize,
    pub assignments: usize,
    pub pending_approvals: usize,
}

pub struct DashboardService {
    api: Arc<ApiClient>,
}

impl DashboardService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    async fn list_all<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: Query,
    ) -> ClientResult<Vec<T>> {
        let list: ListResponse<T> = self.api.get(path, &query).await?;
        Ok(list.into_items())
    }

    /// Screen for a freshly signed-in user
    ///
    /// Teachers and students are looked up by email to read their approval
    /// state; an account missing from the list counts as pending.
    pub async fn destination(&self, claims: &Claims) -> ClientResult<Destination> {
        if !matches!(claims.role, Role::Teacher | Role::Student) {
            return Ok(Destination::resolve(claims.role, ApprovalStatus::Approved));
        }

        let users: Vec<User> = self.list_all(USERS_PATH, Query::new()).await?;
        let approval = claims
            .email
            .as_deref()
            .and_then(|email| users.iter().find(|u| u.email.eq_ignore_ascii_case(email)))
            .map(|u| u.approval_status)
            .unwrap_or_default();

        tracing::debug!(role = %claims.role, ?approval, "Resolved post-login destination");
        Ok(Destination::resolve(claims.role, approval))
    }

    /// Load every admin list concurrently; the first failure wins
    pub async fn admin_overview(&self) -> ClientResult<OverviewStats> {
        let (users, teachers, students, classes, subjects, enrollments, assignments) = futures::try_join!(
            self.list_all::<User>(USERS_PATH, Query::new()),
            self.list_all::<User>(USERS_PATH, Query::new().with("role", Role::Teacher.as_str())),
            self.list_all::<User>(USERS_PATH, Query::new().with("role", Role::Student.as_str())),
            self.list_all::<Class>(CLASSES_PATH, Query::new()),
            self.list_all::<Subject>(SUBJECTS_PATH, Query::new()),
            self.list_all::<Enrollment>(ENROLLMENTS_PATH, Query::new()),
            self.list_all::<ClassSubject>(CLASS_SUBJECTS_PATH, Query::new()),
        )?;

        let pending_approvals = users
            .iter()
            .filter(|u| u.role != Role::Admin && u.approval_status.needs_update())
            .count();

        let stats = OverviewStats {
            users: users.len(),
            teachers: teachers.len(),
            students: students.len(),
            classes: classes.len(),
            subjects: subjects.len(),
            enrollments: enrollments.len(),
            assignments: assignments.len(),
            pending_approvals,
        };
        tracing::debug!(?stats, "Admin overview loaded");
        Ok(stats)
    }
}
