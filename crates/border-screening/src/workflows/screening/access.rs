//! Role-based access for screening operations.
//!
//! Every service call receives an explicit [`AccessContext`]; the role to permission mapping
//! is plain data registered at startup.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::domain::UserId;

pub const ROLE_HEADER: &str = "x-actor-role";
pub const USER_HEADER: &str = "x-actor-id";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Guest,
    Submitter,
    Manager,
    Admin,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Submitter => "submitter",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl FromStr for Role {
    type Err = AccessDenied;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "guest" => Ok(Role::Guest),
            "submitter" => Ok(Role::Submitter),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(AccessDenied::UnknownRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SubmitResponse,
    ViewResponses,
    AssessResponse,
    DeleteResponse,
    RecalculateScores,
}

/// Caller identity passed into every service operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub role: Role,
    pub user_id: Option<UserId>,
}

impl AccessContext {
    pub fn new(role: Role, user_id: Option<UserId>) -> Self {
        Self { role, user_id }
    }

    pub fn guest() -> Self {
        Self::default()
    }

    /// Read `x-actor-role` and `x-actor-id`. A missing role means guest.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AccessDenied> {
        let role = match headers.get(ROLE_HEADER) {
            None => Role::Guest,
            Some(value) => value
                .to_str()
                .map_err(|_| AccessDenied::UnknownRole("<non-ascii>".to_string()))?
                .parse()?,
        };

        let user_id = match headers.get(USER_HEADER) {
            None => None,
            Some(value) => {
                let raw = value
                    .to_str()
                    .map_err(|_| AccessDenied::InvalidUserId("<non-ascii>".to_string()))?;
                let uuid = Uuid::parse_str(raw.trim())
                    .map_err(|_| AccessDenied::InvalidUserId(raw.to_string()))?;
                Some(UserId(uuid))
            }
        };

        Ok(Self { role, user_id })
    }
}

/// Role to permission grants.
#[derive(Debug, Clone, Default)]
pub struct PermissionRegistry {
    grants: BTreeMap<Role, BTreeSet<Permission>>,
}

impl PermissionRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Guests get nothing, submitters may submit, managers also view, assess and delete,
    /// admins hold every permission.
    pub fn standard() -> Self {
        use Permission::*;

        let mut registry = Self::empty();
        registry.grant(Role::Submitter, [SubmitResponse]);
        registry.grant(
            Role::Manager,
            [SubmitResponse, ViewResponses, AssessResponse, DeleteResponse],
        );
        registry.grant(
            Role::Admin,
            [
                SubmitResponse,
                ViewResponses,
                AssessResponse,
                DeleteResponse,
                RecalculateScores,
            ],
        );
        registry
    }

    pub fn grant<I>(&mut self, role: Role, permissions: I)
    where
        I: IntoIterator<Item = Permission>,
    {
        self.grants.entry(role).or_default().extend(permissions);
    }

    pub fn allows(&self, role: Role, permission: Permission) -> bool {
        self.grants
            .get(&role)
            .map(|granted| granted.contains(&permission))
            .unwrap_or(false)
    }

    pub fn permissions(&self, role: Role) -> impl Iterator<Item = Permission> + '_ {
        self.grants.get(&role).into_iter().flatten().copied()
    }

    pub fn require(
        &self,
        context: &AccessContext,
        permission: Permission,
    ) -> Result<(), AccessDenied> {
        if self.allows(context.role, permission) {
            Ok(())
        } else {
            Err(AccessDenied::Forbidden {
                role: context.role,
                permission,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("role {role:?} lacks permission {permission:?}")]
    Forbidden { role: Role, permission: Permission },
    #[error("unknown role '{0}'")]
    UnknownRole(String),
    #[error("invalid actor id '{0}'")]
    InvalidUserId(String),
}
