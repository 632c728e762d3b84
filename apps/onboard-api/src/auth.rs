//! Request authentication and role-based authorization

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::jwt::{extract_bearer_token, extract_cookie_token, validate_access_token};
use crate::state::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Hr,
    Exec,
    BackgroundChecker,
    Employee,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Hr,
        Role::Exec,
        Role::BackgroundChecker,
        Role::Employee,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Hr => "hr",
            Role::Exec => "exec",
            Role::BackgroundChecker => "background_checker",
            Role::Employee => "employee",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == normalized)
            .ok_or_else(|| format!("Unknown role: {}", s))
    }
}

/// Roles allowed to use an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub name: &'static str,
    pub roles: &'static [Role],
}

impl Capabilities {
    /// Staff who may read other users' onboarding packets
    pub const STAFF: Capabilities = Capabilities {
        name: "staff",
        roles: &[Role::Admin, Role::Hr, Role::Exec, Role::BackgroundChecker],
    };

    pub fn permits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny { reason: String },
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }

    pub fn into_result(self) -> Result<(), ApiError> {
        match self {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny { reason } => Err(ApiError::Forbidden(reason)),
        }
    }
}

pub fn authorize(capabilities: &Capabilities, role: Option<Role>) -> AccessDecision {
    match role {
        Some(role) if capabilities.permits(role) => AccessDecision::Allow,
        Some(role) => AccessDecision::Deny {
            reason: format!("Role '{}' lacks {} access", role, capabilities.name),
        },
        None => AccessDecision::Deny {
            reason: "No role assigned".to_string(),
        },
    }
}

/// Caller identity taken from a verified access token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: Option<String>,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_value =
            |name: header::HeaderName| parts.headers.get(name).and_then(|v| v.to_str().ok());

        let token = extract_bearer_token(header_value(header::AUTHORIZATION))
            .or_else(|| extract_cookie_token(header_value(header::COOKIE)))
            .ok_or_else(|| ApiError::Unauthorized("Missing access token".to_string()))?;

        let claims =
            validate_access_token(&token, &state.jwt_secret).map_err(ApiError::Unauthorized)?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}
