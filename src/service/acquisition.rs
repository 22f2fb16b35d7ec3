use std::sync::Arc;

use pims_types::{ActingUser, FileKind, FileNote, FileProperty, PimsFile, UserOverrideSet};

use super::{expect_kind, FileUpdateOrchestrator};
use crate::error::Result;

/// Acquisition files.
///
/// Header edits and property edits are separate calls: `update` never
/// touches associations, `update_properties` never touches header fields.
/// Changing the region of an existing file needs `UPDATE_REGION`.
#[derive(Clone)]
pub struct AcquisitionFileService {
    orchestrator: Arc<FileUpdateOrchestrator>,
}

impl AcquisitionFileService {
    pub fn new(orchestrator: Arc<FileUpdateOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<PimsFile> {
        self.orchestrator
            .get_file(FileKind::AcquisitionFile, id)
            .await
    }

    pub async fn get_properties(&self, id: i64) -> Result<Vec<FileProperty>> {
        Ok(self.get_by_id(id).await?.properties)
    }

    pub async fn get_notes(&self, id: i64) -> Result<Vec<FileNote>> {
        self.orchestrator
            .notes(FileKind::AcquisitionFile, id)
            .await
    }

    pub async fn is_row_version_equal(&self, id: i64, row_version: i64) -> Result<bool> {
        self.orchestrator
            .is_row_version_equal(FileKind::AcquisitionFile, id, row_version)
            .await
    }

    pub async fn add(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        expect_kind(&file, FileKind::AcquisitionFile)?;
        self.orchestrator.add_file(user, file, overrides).await
    }

    pub async fn update(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        expect_kind(&file, FileKind::AcquisitionFile)?;
        self.orchestrator.update_fields(user, file, overrides).await
    }

    pub async fn update_properties(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        expect_kind(&file, FileKind::AcquisitionFile)?;
        self.orchestrator
            .update_properties(user, file, overrides)
            .await
    }
}
