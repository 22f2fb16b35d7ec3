use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Caller consent to proceed past a specific detected conflict.
///
/// Closed set; unknown wire values are rejected at the boundary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UserOverrideCode {
    /// Attach a property that is already associated with another file.
    AddPropertyToInventory,
    /// Write the selected location onto an inventory property that has none.
    AddLocationToProperty,
    /// Change the ministry region of an existing file.
    UpdateRegion,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized user override code '{code}'")]
pub struct ParseOverrideCodeError {
    pub code: String,
}

/// The override codes supplied with one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserOverrideSet(BTreeSet<UserOverrideCode>);

impl UserOverrideSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the flat string list sent by the client.
    pub fn parse<S: AsRef<str>>(codes: &[S]) -> Result<Self, ParseOverrideCodeError> {
        codes
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                UserOverrideCode::from_str(raw).map_err(|_| ParseOverrideCodeError {
                    code: raw.to_string(),
                })
            })
            .collect()
    }

    pub fn with(mut self, code: UserOverrideCode) -> Self {
        self.0.insert(code);
        self
    }

    pub fn contains(&self, code: UserOverrideCode) -> bool {
        self.0.contains(&code)
    }
}

impl FromIterator<UserOverrideCode> for UserOverrideSet {
    fn from_iter<I: IntoIterator<Item = UserOverrideCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<UserOverrideCode> for UserOverrideSet {
    fn from(code: UserOverrideCode) -> Self {
        Self::new().with(code)
    }
}
