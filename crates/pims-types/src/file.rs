use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::property::Property;

/// The kinds of file that can hold property associations.
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
pub enum FileKind {
    Lease,
    AcquisitionFile,
    ResearchFile,
}

impl FileKind {
    /// Prefix used when naming a file to a user, e.g. "L-File # 10".
    pub fn number_label(self) -> &'static str {
        match self {
            FileKind::Lease => "L-File",
            FileKind::AcquisitionFile => "Acquisition File",
            FileKind::ResearchFile => "R-File",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            FileKind::Lease => "Lease",
            FileKind::AcquisitionFile => "Acquisition File",
            FileKind::ResearchFile => "Research File",
        }
    }
}

/// Join row between a file and a property.
///
/// `property` is only meaningful while the association is new and its
/// property has not been matched; once `property_id` is set the payload is
/// reference-only and never written back to inventory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileProperty {
    pub id: Option<i64>,
    pub file_id: Option<i64>,
    pub property_id: Option<i64>,
    pub property_name: Option<String>,
    pub property: Option<Property>,
    pub row_version: Option<i64>,
}

impl FileProperty {
    /// A new association carrying an unmatched property payload.
    pub fn new(property: Property) -> Self {
        Self {
            property: Some(property),
            ..Self::default()
        }
    }

    /// A new association to an inventory property by id.
    pub fn for_property_id(property_id: i64) -> Self {
        Self {
            property_id: Some(property_id),
            ..Self::default()
        }
    }

    /// Property id from the join row, falling back to the embedded payload.
    pub fn resolved_property_id(&self) -> Option<i64> {
        self.property_id
            .or_else(|| self.property.as_ref().and_then(|p| p.id))
    }
}

/// A lease, acquisition file or research file with its property list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PimsFile {
    pub kind: FileKind,
    #[serde(default)]
    pub id: Option<i64>,
    /// Human-readable number (L-File number, acquisition file number).
    #[serde(default)]
    pub file_number: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    pub status_code: String,
    #[serde(default)]
    pub region_code: Option<i16>,
    #[serde(default)]
    pub row_version: Option<i64>,
    #[serde(default)]
    pub properties: Vec<FileProperty>,
}

impl PimsFile {
    pub fn new(kind: FileKind, status_code: impl Into<String>) -> Self {
        Self {
            kind,
            id: None,
            file_number: None,
            file_name: None,
            status_code: status_code.into(),
            region_code: None,
            row_version: None,
            properties: Vec::new(),
        }
    }

    pub fn with_number(mut self, file_number: impl Into<String>) -> Self {
        self.file_number = Some(file_number.into());
        self
    }

    pub fn with_property(mut self, association: FileProperty) -> Self {
        self.properties.push(association);
        self
    }

    /// "L-File # 10", falling back to the internal id when unnumbered.
    pub fn display_number(&self) -> String {
        display_number(self.kind, self.file_number.as_deref(), self.id)
    }
}

/// One existing association of a property, as seen from the property side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAssociation {
    pub kind: FileKind,
    pub association_id: i64,
    pub file_id: i64,
    pub file_number: Option<String>,
}

impl PropertyAssociation {
    pub fn display_number(&self) -> String {
        display_number(self.kind, self.file_number.as_deref(), Some(self.file_id))
    }
}

/// How many files of each kind reference a property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationCounts {
    pub leases: usize,
    pub research_files: usize,
    pub acquisition_files: usize,
}

impl AssociationCounts {
    pub fn total(&self) -> usize {
        self.leases + self.research_files + self.acquisition_files
    }

    pub fn increment(&mut self, kind: FileKind) {
        match kind {
            FileKind::Lease => self.leases += 1,
            FileKind::AcquisitionFile => self.acquisition_files += 1,
            FileKind::ResearchFile => self.research_files += 1,
        }
    }
}

fn display_number(kind: FileKind, file_number: Option<&str>, id: Option<i64>) -> String {
    let number = match (file_number, id) {
        (Some(n), _) => n.to_string(),
        (None, Some(id)) => id.to_string(),
        (None, None) => "(new)".to_string(),
    };
    format!("{} # {}", kind.number_label(), number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_display_number() {
        let mut lease = PimsFile::new(FileKind::Lease, "ACTIVE").with_number("10");
        lease.id = Some(99);
        assert_eq!(lease.display_number(), "L-File # 10");
    }

    #[test]
    fn display_number_falls_back_to_id() {
        let assoc = PropertyAssociation {
            kind: FileKind::AcquisitionFile,
            association_id: 1,
            file_id: 42,
            file_number: None,
        };
        assert_eq!(assoc.display_number(), "Acquisition File # 42");
    }

    #[test]
    fn file_kind_wire_names() {
        assert_eq!(FileKind::AcquisitionFile.to_string(), "ACQUISITION_FILE");
        assert_eq!("LEASE".parse::<FileKind>().unwrap(), FileKind::Lease);
        let json = serde_json::to_value(FileKind::ResearchFile).unwrap();
        assert_eq!(json, "RESEARCH_FILE");
    }

    #[test]
    fn counts_by_kind() {
        let mut counts = AssociationCounts::default();
        counts.increment(FileKind::Lease);
        counts.increment(FileKind::Lease);
        counts.increment(FileKind::ResearchFile);
        assert_eq!(counts.leases, 2);
        assert_eq!(counts.acquisition_files, 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn resolved_property_id_prefers_join_row() {
        let mut assoc = FileProperty::for_property_id(5);
        assoc.property = Some(Property {
            id: Some(6),
            ..Property::default()
        });
        assert_eq!(assoc.resolved_property_id(), Some(5));
        assoc.property_id = None;
        assert_eq!(assoc.resolved_property_id(), Some(6));
    }
}
