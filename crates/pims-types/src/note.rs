use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::file::FileKind;
use crate::user::ActingUser;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    #[serde(default)]
    pub id: Option<i64>,
    pub text: String,
    pub is_system_generated: bool,
    pub created_by: String,
    #[serde(default)]
    pub created_by_guid: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A note attached to a lease, acquisition file or research file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNote {
    pub kind: FileKind,
    pub file_id: i64,
    pub note: Note,
}

impl FileNote {
    /// System-generated record of a file status transition.
    pub fn status_change(
        kind: FileKind,
        file_id: i64,
        from: &str,
        to: &str,
        user: &ActingUser,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            file_id,
            note: Note {
                id: None,
                text: format!("{} status changed from {from} to {to}", kind.display_name()),
                is_system_generated: true,
                created_by: user.username.clone(),
                created_by_guid: user.user_guid,
                created_at,
            },
        }
    }
}
