use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The user on whose behalf a file update runs.
///
/// Passed explicitly into every service call; there is no ambient identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActingUser {
    pub username: String,
    #[serde(default)]
    pub user_guid: Option<Uuid>,
}

impl ActingUser {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            user_guid: None,
        }
    }

    pub fn with_guid(mut self, user_guid: Uuid) -> Self {
        self.user_guid = Some(user_guid);
        self
    }
}
