use serde::{Deserialize, Serialize};

use crate::mindguard::types::UserId;

/// Shown when neither a name nor an email can be resolved for a counterpart.
pub const UNKNOWN_USER: &str = "Unknown User";

/// A user identity from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
}

impl Profile {
    pub fn new(id: UserId, email: impl Into<String>, full_name: Option<String>) -> Self {
        Self {
            id,
            email: email.into(),
            full_name,
        }
    }

    /// Resolves the name to display for this profile.
    ///
    /// Falls back from `full_name` to `email` to [`UNKNOWN_USER`], treating
    /// blank strings as absent.
    pub fn display_name(&self) -> String {
        self.full_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                let email = self.email.trim();
                if email.is_empty() {
                    UNKNOWN_USER.to_string()
                } else {
                    email.to_string()
                }
            })
    }
}

/// Display name for a possibly-unknown counterpart.
pub(crate) fn resolve_display_name(profile: Option<&Profile>) -> String {
    match profile {
        Some(profile) => profile.display_name(),
        None => UNKNOWN_USER.to_string(),
    }
}
