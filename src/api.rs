//! Wire shapes shared by callers of the file services.

use serde::{Deserialize, Serialize};

use pims_types::{PimsFile, UserOverrideCode, UserOverrideSet};

use crate::error::{PimsError, Result};

/// A file payload together with the override codes the user accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpdateRequest {
    pub file: PimsFile,
    #[serde(default)]
    pub user_override_codes: Vec<String>,
}

impl FileUpdateRequest {
    /// Parse the raw override strings; unknown codes are a validation error.
    pub fn overrides(&self) -> Result<UserOverrideSet> {
        Ok(UserOverrideSet::parse(&self.user_override_codes)?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub status: u16,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_override_code: Option<UserOverrideCode>,
}

impl From<&PimsError> for ErrorResponse {
    fn from(err: &PimsError) -> Self {
        Self {
            status: err.http_status(),
            error: err.to_string(),
            user_override_code: err.override_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pims_types::FileKind;

    #[test]
    fn request_parses_override_codes() {
        let request: FileUpdateRequest = serde_json::from_value(serde_json::json!({
            "file": { "kind": "LEASE", "statusCode": "DRAFT" },
            "userOverrideCodes": ["ADD_PROPERTY_TO_INVENTORY"]
        }))
        .unwrap();
        assert_eq!(request.file.kind, FileKind::Lease);
        assert!(request
            .overrides()
            .unwrap()
            .contains(UserOverrideCode::AddPropertyToInventory));
    }

    #[test]
    fn unknown_override_code_is_rejected() {
        let request = FileUpdateRequest {
            file: PimsFile::new(FileKind::Lease, "DRAFT"),
            user_override_codes: vec!["SKIP_CHECKS".into()],
        };
        let err = request.overrides().unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn override_error_carries_code_on_the_wire() {
        let err = PimsError::override_required(
            UserOverrideCode::AddPropertyToInventory,
            "PID 123456789 is attached to L-File # 10",
        );
        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(json["status"], 409);
        assert_eq!(json["userOverrideCode"], "ADD_PROPERTY_TO_INVENTORY");
        assert_eq!(json["error"], "PID 123456789 is attached to L-File # 10");
    }

    #[test]
    fn plain_error_omits_override_code() {
        let json =
            serde_json::to_value(ErrorResponse::from(&PimsError::NotFound("Lease 4".into())))
                .unwrap();
        assert_eq!(json["status"], 404);
        assert!(json.get("userOverrideCode").is_none());
    }
}
