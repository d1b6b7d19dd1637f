//! Login, user management, approvals and registration
//!
//! Login validates input locally, exchanges credentials for a token pair and
//! decodes the access token's claims. Persisting the tokens is up to the
//! caller (see `TokenSlot`).

use hajiri_common::api::auth::{ApprovalStatus, Claims, Role};
use hajiri_common::api::types::{
    ApprovalAction, ApprovalRequest, FeedbackRequest, ListResponse, TokenPair, TokenRequest,
    User, UserPayload,
};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ClientError, ClientResult};
use crate::http::{ApiClient, Query};
use crate::services::capture::decode_frame;

pub const TOKEN_PATH: &str = "/api/token/";
pub const USERS_PATH: &str = "/accounts/api/users/";
pub const PENDING_USERS_PATH: &str = "/api/admin/pending-users/";
pub const APPROVE_USER_PATH: &str = "/api/admin/approve-user/";
pub const SEND_FEEDBACK_PATH: &str = "/api/admin/send-feedback/";

const PASSWORD_SPECIALS: &str = "@$!%*?&#";

/// `something@domain.tld` with no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

/// 8+ characters drawn from letters, digits and `@$!%*?&#`, with at least one
/// lowercase, uppercase, digit and special character
pub fn is_strong_password(password: &str) -> bool {
    let allowed = password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || PASSWORD_SPECIALS.contains(c));

    allowed
        && password.chars().count() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SPECIALS.contains(c))
}

/// Result of a successful login
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub tokens: TokenPair,
    pub claims: Claims,
}

impl LoginOutcome {
    pub fn role(&self) -> Role {
        self.claims.role
    }
}

/// Filters understood by the users list endpoint
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub roll_number: Option<String>,
    pub department: Option<String>,
    pub approval_status: Option<ApprovalStatus>,
}

impl UserFilter {
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Default::default()
        }
    }

    fn to_query(&self) -> Query {
        let approval = self.approval_status.map(|s| match s {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Unapproved => "unapproved",
        });

        Query::new()
            .with_opt("role", self.role.map(|r| r.as_str()))
            .with_opt("name__icontains", self.name.as_deref())
            .with_opt("email__icontains", self.email.as_deref())
            .with_opt("roll_number__contains", self.roll_number.as_deref())
            .with_opt("department", self.department.as_deref())
            .with_opt("approval_status", approval)
    }
}

/// Profile photo attached to a registration
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub bytes: Vec<u8>,
}

impl Photo {
    /// Decode a captured frame (data URL or bare base64)
    pub fn from_frame(frame: &str) -> ClientResult<Self> {
        Ok(Self {
            bytes: decode_frame(frame)?,
        })
    }

    pub fn from_file(path: &std::path::Path) -> ClientResult<Self> {
        Ok(Self {
            bytes: std::fs::read(path)?,
        })
    }
}

/// Self-registration form
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub role: Role,
    pub photo: Option<Photo>,
    pub semester: Option<String>,
    pub section: Option<String>,
    pub department: Option<String>,
    pub roll_number: Option<String>,
}

fn missing(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

impl RegistrationForm {
    /// Field-by-field problems; empty when the form can be submitted
    pub fn validate(&self) -> BTreeMap<&'static str, &'static str> {
        let mut errors = BTreeMap::new();

        if self.full_name.trim().is_empty() {
            errors.insert("full_name", "Full Name is required");
        }
        if !is_valid_email(&self.email) {
            errors.insert("email", "Invalid email address");
        }
        if !is_strong_password(&self.password) {
            errors.insert(
                "password",
                "Password must be 8+ chars with uppercase, lowercase, number, and special character (@$!%*?&#)",
            );
        }
        if self.password != self.confirm_password {
            errors.insert("confirm_password", "Passwords do not match");
        }
        if self.photo.is_none() {
            errors.insert("photo", "Please upload or capture a photo");
        }

        match self.role {
            Role::Student => {
                if missing(&self.semester) {
                    errors.insert("semester", "Semester is required");
                }
                if missing(&self.section) {
                    errors.insert("section", "Section is required");
                }
                if missing(&self.department) {
                    errors.insert("department", "Department is required");
                }
                if missing(&self.roll_number) {
                    errors.insert("roll_number", "Roll number is required");
                }
            }
            Role::Teacher | Role::Admin => {}
            Role::Anonymous => {
                errors.insert("role", "Please choose a role");
            }
        }

        errors
    }

    fn into_form(self) -> ClientResult<Form> {
        let photo = self
            .photo
            .ok_or_else(|| ClientError::Validation("Please upload or capture a photo".to_string()))?;

        let mut form = Form::new()
            .text("email", self.email.clone())
            .text("username", self.email)
            .text("name", self.full_name)
            .text("role", self.role.as_str())
            .text("password", self.password);

        if self.role == Role::Student {
            let fields = [
                ("semester", self.semester),
                ("section", self.section),
                ("department", self.department),
                ("roll_number", self.roll_number),
            ];
            for (name, value) in fields {
                if let Some(value) = value {
                    form = form.text(name, value);
                }
            }
        }

        let avatar = Part::bytes(photo.bytes)
            .file_name("photo.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| ClientError::Validation(e.to_string()))?;

        Ok(form.part("avatar", avatar))
    }
}

/// Accounts service
pub struct AccountsService {
    api: Arc<ApiClient>,
}

impl AccountsService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }

    /// Exchange credentials for a token pair
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<LoginOutcome> {
        if !is_valid_email(email) {
            return Err(ClientError::Validation("Please enter a valid email".to_string()));
        }
        if password.chars().count() < 6 {
            return Err(ClientError::Validation(
                "Password must be at least 6 characters".to_string(),
            ));
        }

        let request = TokenRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let tokens: TokenPair = match self.api.post(TOKEN_PATH, &request).await {
            Ok(tokens) => tokens,
            Err(ClientError::Unauthorized(_)) => {
                return Err(ClientError::Unauthorized("Invalid email or password".to_string()))
            }
            Err(e) => return Err(e),
        };

        let claims = Claims::from_access_token(&tokens.access)?;
        tracing::info!(email = %email, role = %claims.role, "Login successful");

        Ok(LoginOutcome { tokens, claims })
    }

    // ---------- Users ----------

    pub async fn list_users(&self, filter: &UserFilter) -> ClientResult<Vec<User>> {
        let list: ListResponse<User> = self.api.get(USERS_PATH, &filter.to_query()).await?;
        Ok(list.into_items())
    }

    pub async fn get_user(&self, id: i64) -> ClientResult<User> {
        self.api
            .get(&format!("{}{}/", USERS_PATH, id), &Query::new())
            .await
    }

    pub async fn create_user(&self, payload: &UserPayload) -> ClientResult<User> {
        validate_user_payload(payload)?;
        let user: User = self.api.post(USERS_PATH, payload).await?;
        tracing::info!(email = %user.email, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, id: i64, payload: &UserPayload) -> ClientResult<User> {
        validate_user_payload(payload)?;
        self.api.put(&format!("{}{}/", USERS_PATH, id), payload).await
    }

    /// Delete a user; an admin can never delete their own account
    pub async fn delete_user(&self, id: i64, acting_user_id: Option<i64>) -> ClientResult<()> {
        if acting_user_id == Some(id) {
            return Err(ClientError::Validation(
                "You cannot delete your own account".to_string(),
            ));
        }
        self.api.delete(&format!("{}{}/", USERS_PATH, id)).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    // ---------- Approvals ----------

    pub async fn pending_users(&self) -> ClientResult<Vec<User>> {
        let list: ListResponse<User> = self.api.get(PENDING_USERS_PATH, &Query::new()).await?;
        Ok(list.into_items())
    }

    pub async fn set_approval(&self, email: &str, action: ApprovalAction) -> ClientResult<()> {
        if !is_valid_email(email) {
            return Err(ClientError::Validation("Please select a user".to_string()));
        }
        let request = ApprovalRequest {
            email: email.to_string(),
            action,
        };
        let _: serde_json::Value = self.api.post(APPROVE_USER_PATH, &request).await?;
        tracing::info!(email = %email, action = ?action, "Approval updated");
        Ok(())
    }

    pub async fn send_feedback(&self, email: &str, feedback: &str) -> ClientResult<()> {
        if email.trim().is_empty() || feedback.trim().is_empty() {
            return Err(ClientError::Validation(
                "Please select a user and enter feedback".to_string(),
            ));
        }
        let request = FeedbackRequest {
            email: email.to_string(),
            feedback: feedback.trim().to_string(),
        };
        let _: serde_json::Value = self.api.post(SEND_FEEDBACK_PATH, &request).await?;
        tracing::info!(email = %email, "Feedback sent");
        Ok(())
    }

    // ---------- Registration ----------

    /// Submit a registration
    ///
    /// `editing_user_id` is set when a pending or unapproved user updates
    /// their own details; the record is then patched in place.
    pub async fn register(
        &self,
        form: RegistrationForm,
        editing_user_id: Option<i64>,
    ) -> ClientResult<User> {
        let errors = form.validate();
        if !errors.is_empty() {
            let message = errors.values().copied().collect::<Vec<_>>().join("; ");
            return Err(ClientError::Validation(message));
        }

        let email = form.email.clone();
        let multipart = form.into_form()?;

        let user: User = match editing_user_id {
            Some(id) => {
                self.api
                    .send_multipart(Method::PATCH, &format!("{}{}/", USERS_PATH, id), multipart)
                    .await?
            }
            None => {
                self.api
                    .send_multipart(Method::POST, USERS_PATH, multipart)
                    .await?
            }
        };

        tracing::info!(email = %email, updated = editing_user_id.is_some(), "Registration submitted");
        Ok(user)
    }
}

fn validate_user_payload(payload: &UserPayload) -> ClientResult<()> {
    if payload.name.trim().is_empty() {
        return Err(ClientError::Validation("Name is required".to_string()));
    }
    if !is_valid_email(&payload.email) {
        return Err(ClientError::Validation("Invalid email address".to_string()));
    }
    if payload.role == Role::Anonymous {
        return Err(ClientError::Validation("Please choose a role".to_string()));
    }
    Ok(())
}
