use std::sync::Arc;

use pims_types::{ActingUser, FileKind, FileNote, PimsFile, UserOverrideSet};

use super::{expect_kind, FileUpdateOrchestrator};
use crate::error::Result;

/// Leases and licences.
///
/// An update applies scalar fields and the property list together.
#[derive(Clone)]
pub struct LeaseService {
    orchestrator: Arc<FileUpdateOrchestrator>,
}

impl LeaseService {
    pub fn new(orchestrator: Arc<FileUpdateOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<PimsFile> {
        self.orchestrator.get_file(FileKind::Lease, id).await
    }

    pub async fn get_notes(&self, id: i64) -> Result<Vec<FileNote>> {
        self.orchestrator.notes(FileKind::Lease, id).await
    }

    pub async fn is_row_version_equal(&self, id: i64, row_version: i64) -> Result<bool> {
        self.orchestrator
            .is_row_version_equal(FileKind::Lease, id, row_version)
            .await
    }

    pub async fn add(
        &self,
        user: &ActingUser,
        lease: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        expect_kind(&lease, FileKind::Lease)?;
        self.orchestrator.add_file(user, lease, overrides).await
    }

    pub async fn update(
        &self,
        user: &ActingUser,
        lease: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        expect_kind(&lease, FileKind::Lease)?;
        self.orchestrator.update_file(user, lease, overrides).await
    }

    pub async fn update_properties(
        &self,
        user: &ActingUser,
        lease: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        expect_kind(&lease, FileKind::Lease)?;
        self.orchestrator
            .update_properties(user, lease, overrides)
            .await
    }
}
