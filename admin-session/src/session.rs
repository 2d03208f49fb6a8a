use crate::internal::claims::Claims;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

//--------------------------------------------------------------------------------------------------
// Profile override
//--------------------------------------------------------------------------------------------------

/// Locally edited profile fields. There is no server write-back for profile edits, so these live
/// next to the credential and are dropped with it on logout.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileOverride {
    pub fn merge(self, update: ProfileOverride) -> Self {
        Self {
            name: update.name.or(self.name),
            first_name: update.first_name.or(self.first_name),
            last_name: update.last_name.or(self.last_name),
            email: update.email.or(self.email),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Session view
//--------------------------------------------------------------------------------------------------

/// Read-only view of the current claims. Built fresh on every read and never written back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub id: Option<String>,
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_active: bool,
    pub is_deleted: bool,
    pub issued_at: Option<OffsetDateTime>,
    pub expires_at: Option<OffsetDateTime>,
}

impl Session {
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            id: claims.sub().map(|s| s.to_string()),
            name: claims.name().map(str::to_string),
            first_name: claims.first_name().map(str::to_string),
            last_name: claims.last_name().map(str::to_string),
            email: claims.email().map(str::to_string),
            role: claims.role().map(str::to_string),
            is_active: claims.is_active(),
            is_deleted: claims.is_deleted(),
            issued_at: claims.iat().and_then(|t| t.to_datetime()),
            expires_at: claims.exp().and_then(|t| t.to_datetime()),
        }
    }

    pub fn with_override(mut self, profile: &ProfileOverride) -> Self {
        if let Some(name) = &profile.name {
            self.name = Some(name.clone());
        }
        if let Some(first_name) = &profile.first_name {
            self.first_name = Some(first_name.clone());
        }
        if let Some(last_name) = &profile.last_name {
            self.last_name = Some(last_name.clone());
        }
        if let Some(email) = &profile.email {
            self.email = Some(email.clone());
        }
        self
    }

    /// `name`, else "first last", else the email, else the id.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let full = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !full.is_empty() {
            return full;
        }
        self.email
            .clone()
            .or_else(|| self.id.clone())
            .unwrap_or_default()
    }

    pub fn has_role(&self, roles: &[String]) -> bool {
        self.role
            .as_ref()
            .is_some_and(|role| roles.iter().any(|r| r.eq_ignore_ascii_case(role)))
    }
}

//--------------------------------------------------------------------------------------------------
