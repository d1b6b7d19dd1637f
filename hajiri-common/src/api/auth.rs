//! Roles, access-token claims and bearer token providers
//!
//! The backend issues JWT access tokens whose payload carries the user's
//! email, role and id. The client only reads those claims to decide what a
//! user may do locally; the backend remains the authority on every call.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use crate::{Error, Result};

// ========================================
// Roles
// ========================================

/// Who the current user is, as far as the client is concerned
///
/// Anything the backend reports that is not one of the three known roles
/// (including a missing role claim) is treated as `Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
    #[default]
    #[serde(other)]
    Anonymous,
}

impl Role {
    /// Parse a role claim; unknown values become `Anonymous`
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim.map(|c| c.trim().to_ascii_lowercase()) {
            Some(c) if c == "admin" => Role::Admin,
            Some(c) if c == "teacher" => Role::Teacher,
            Some(c) if c == "student" => Role::Student,
            _ => Role::Anonymous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
            Role::Anonymous => "anonymous",
        }
    }

    /// Classes, subjects, users, enrollments and teacher assignments
    pub fn can_manage_academics(&self) -> bool {
        match self {
            Role::Admin => true,
            Role::Teacher | Role::Student | Role::Anonymous => false,
        }
    }

    /// Opening sessions, recognition and manual marks
    pub fn can_run_attendance(&self) -> bool {
        match self {
            Role::Teacher => true,
            Role::Admin | Role::Student | Role::Anonymous => false,
        }
    }

    /// Attendance records of other students
    pub fn can_view_student_records(&self) -> bool {
        match self {
            Role::Admin | Role::Teacher => true,
            Role::Student | Role::Anonymous => false,
        }
    }

    pub fn can_view_own_attendance(&self) -> bool {
        match self {
            Role::Student => true,
            Role::Admin | Role::Teacher | Role::Anonymous => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    /// Strict parse for user input; only assignable roles are accepted
    fn from_str(s: &str) -> Result<Self> {
        match Role::from_claim(Some(s)) {
            Role::Anonymous => Err(Error::Validation(format!(
                "Unknown role '{}' (expected admin, teacher or student)",
                s
            ))),
            role => Ok(role),
        }
    }
}

/// Registration review state of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    #[default]
    Pending,
    Approved,
    Unapproved,
}

impl ApprovalStatus {
    /// Pending and unapproved users must update their registration first
    pub fn needs_update(&self) -> bool {
        match self {
            ApprovalStatus::Pending | ApprovalStatus::Unapproved => true,
            ApprovalStatus::Approved => false,
        }
    }
}

// ========================================
// Token claims
// ========================================

#[derive(Debug, Clone, Default, Deserialize)]
struct RawClaims {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    user_id: Option<serde_json::Value>,
    #[serde(default)]
    exp: Option<i64>,
}

/// Claims read from an access token's payload
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    pub email: Option<String>,
    pub role: Role,
    pub user_id: Option<i64>,
    /// Expiry as Unix seconds
    pub expires_at: Option<i64>,
}

impl Claims {
    /// Decode the payload segment of a JWT without verifying its signature
    pub fn from_access_token(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| Error::Token("access token is not a JWT".to_string()))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| Error::Token(format!("payload is not base64url: {}", e)))?;

        let raw: RawClaims = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Token(format!("payload is not JSON: {}", e)))?;

        let user_id = match raw.user_id {
            Some(serde_json::Value::Number(n)) => n.as_i64(),
            Some(serde_json::Value::String(s)) => s.parse().ok(),
            _ => None,
        };

        Ok(Self {
            email: raw.email,
            role: Role::from_claim(raw.role.as_deref()),
            user_id,
            expires_at: raw.exp,
        })
    }
}

// ========================================
// Token providers
// ========================================

/// Source of the bearer token attached to every outgoing call
///
/// Storage and refresh of tokens belong to the surrounding application; the
/// client only asks for the current value.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// No authentication
#[derive(Debug, Clone, Copy, Default)]
pub struct NoToken;

impl TokenProvider for NoToken {
    fn access_token(&self) -> Option<String> {
        None
    }
}

/// A fixed token supplied by configuration
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenProvider for StaticToken {
    fn access_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// A token that can be replaced at runtime, e.g. after login
#[derive(Debug, Default)]
pub struct TokenSlot {
    token: RwLock<Option<String>>,
}

impl TokenSlot {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            token: RwLock::new(initial),
        }
    }

    pub fn set(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    pub fn clear(&self) {
        self.set(None);
    }
}

impl TokenProvider for TokenSlot {
    fn access_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}
