use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};

use pims_spatial::CoordinateTransform;
use pims_types::{
    ActingUser, FileKind, FileNote, FileProperty, PimsFile, UserOverrideCode, UserOverrideSet,
};

use crate::config::PimsConfig;
use crate::error::{PimsError, Result};
use crate::property::PropertyMatcher;
use crate::reconcile::AssociationReconciler;
use crate::store::{PimsStore, UnitOfWork};

/// Which parts of a submitted file an update applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateScope {
    All,
    Fields,
    Properties,
}

impl UpdateScope {
    fn fields(self) -> bool {
        matches!(self, UpdateScope::All | UpdateScope::Fields)
    }

    fn properties(self) -> bool {
        matches!(self, UpdateScope::All | UpdateScope::Properties)
    }
}

/// Runs a whole file update inside one unit of work.
///
/// Any error drops the unit of work, so a failed call leaves no property,
/// association or note behind.
pub struct FileUpdateOrchestrator {
    store: Arc<dyn PimsStore>,
    transform: Arc<dyn CoordinateTransform>,
    config: Arc<PimsConfig>,
    matcher: PropertyMatcher,
    reconciler: AssociationReconciler,
}

impl FileUpdateOrchestrator {
    pub fn new(
        store: Arc<dyn PimsStore>,
        transform: Arc<dyn CoordinateTransform>,
        config: Arc<PimsConfig>,
    ) -> Result<Self> {
        config.validate(transform.as_ref())?;
        Ok(Self {
            matcher: PropertyMatcher::new(Arc::clone(&transform), Arc::clone(&config)),
            reconciler: AssociationReconciler::new(Arc::clone(&transform), Arc::clone(&config)),
            store,
            transform,
            config,
        })
    }

    /// Load a file with its property locations in the geographic SRID.
    pub async fn get_file(&self, kind: FileKind, id: i64) -> Result<PimsFile> {
        let mut uow = self.store.begin().await?;
        let mut file = uow
            .load_file(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))?;
        drop(uow);

        let display = self.config.spatial.geographic_srid;
        for association in &mut file.properties {
            if let Some(property) = association.property.as_mut() {
                if let Some(location) = property.location {
                    property.location = Some(location.to_srid(self.transform.as_ref(), display)?);
                }
            }
        }
        Ok(file)
    }

    pub async fn row_version(&self, kind: FileKind, id: i64) -> Result<i64> {
        let mut uow = self.store.begin().await?;
        uow.file_row_version(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))
    }

    pub async fn is_row_version_equal(
        &self,
        kind: FileKind,
        id: i64,
        row_version: i64,
    ) -> Result<bool> {
        Ok(self.row_version(kind, id).await? == row_version)
    }

    pub async fn notes(&self, kind: FileKind, id: i64) -> Result<Vec<FileNote>> {
        let mut uow = self.store.begin().await?;
        Ok(uow.file_notes(kind, id).await?)
    }

    #[instrument(skip_all, fields(kind = %file.kind, user = %user.username))]
    pub async fn add_file(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        if file.id.is_some() {
            return Err(PimsError::Validation(format!(
                "a new {} cannot carry an id",
                file.kind.display_name()
            )));
        }
        validate_fields(&file)?;
        validate_associations(&file.properties)?;

        let mut uow = self.store.begin().await?;
        let desired = self.resolve_properties(uow.as_mut(), &file, overrides).await?;

        let id = uow.insert_file(&file).await?;
        self.apply_associations(uow.as_mut(), file.kind, id, desired, &[])
            .await?;

        let persisted = uow
            .load_file(file.kind, id)
            .await?
            .ok_or_else(|| not_found(file.kind, id))?;
        uow.commit().await?;

        info!(
            file_id = id,
            properties = persisted.properties.len(),
            "Added {}",
            file.kind.display_name()
        );
        Ok(persisted)
    }

    /// Scalar fields, status note and property associations.
    pub async fn update_file(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        self.update(user, file, overrides, UpdateScope::All).await
    }

    /// Property associations only; scalar fields in `file` are ignored.
    pub async fn update_properties(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        self.update(user, file, overrides, UpdateScope::Properties)
            .await
    }

    /// Scalar fields and status note only; `file.properties` is ignored.
    pub async fn update_fields(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<PimsFile> {
        self.update(user, file, overrides, UpdateScope::Fields).await
    }

    #[instrument(skip_all, fields(kind = %file.kind, file_id = ?file.id, user = %user.username, scope = ?scope))]
    async fn update(
        &self,
        user: &ActingUser,
        file: PimsFile,
        overrides: &UserOverrideSet,
        scope: UpdateScope,
    ) -> Result<PimsFile> {
        let kind = file.kind;
        let id = file
            .id
            .ok_or_else(|| PimsError::Validation(format!("{} id is required", kind.display_name())))?;
        let row_version = file.row_version.ok_or_else(|| {
            PimsError::Validation(format!("{} row version is required", kind.display_name()))
        })?;
        if scope.fields() {
            validate_fields(&file)?;
        }
        if scope.properties() {
            validate_associations(&file.properties)?;
        }

        let mut uow = self.store.begin().await?;

        let current = uow
            .load_file(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))?;
        if current.row_version != Some(row_version) {
            return Err(stale(&current));
        }

        let header = if scope.fields() {
            self.check_region_change(&current, &file, overrides)?;
            if current.status_code != file.status_code {
                let note = FileNote::status_change(
                    kind,
                    id,
                    &current.status_code,
                    &file.status_code,
                    user,
                    Utc::now(),
                );
                debug!(text = %note.note.text, "Recording status change");
                uow.add_note(&note).await?;
            }
            PimsFile {
                properties: Vec::new(),
                ..file.clone()
            }
        } else {
            PimsFile {
                properties: Vec::new(),
                ..current.clone()
            }
        };
        // bumps the file token even when only associations change
        if uow.update_file(&header).await?.is_none() {
            return Err(stale(&current));
        }

        if scope.properties() {
            let desired = self.resolve_properties(uow.as_mut(), &file, overrides).await?;
            self.apply_associations(uow.as_mut(), kind, id, desired, &current.properties)
                .await?;
        }

        let persisted = uow
            .load_file(kind, id)
            .await?
            .ok_or_else(|| not_found(kind, id))?;
        uow.commit().await?;

        info!(
            file_id = id,
            row_version = ?persisted.row_version,
            properties = persisted.properties.len(),
            "Updated {}",
            kind.display_name()
        );
        Ok(persisted)
    }

    fn check_region_change(
        &self,
        current: &PimsFile,
        incoming: &PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<()> {
        if current.kind != FileKind::AcquisitionFile
            || current.region_code.is_none()
            || current.region_code == incoming.region_code
            || overrides.contains(UserOverrideCode::UpdateRegion)
        {
            return Ok(());
        }
        Err(PimsError::override_required(
            UserOverrideCode::UpdateRegion,
            "The Ministry region has been changed, this will result in a change to the \
             file's prefix. Do you want to proceed?",
        ))
    }

    async fn resolve_properties(
        &self,
        uow: &mut dyn UnitOfWork,
        file: &PimsFile,
        overrides: &UserOverrideSet,
    ) -> Result<Vec<FileProperty>> {
        let mut matched = Vec::with_capacity(file.properties.len());
        for association in &file.properties {
            let found = self
                .matcher
                .match_property(uow, association, overrides)
                .await?;
            matched.push((association.clone(), found));
        }
        self.reconciler
            .reconcile(uow, file, matched, overrides)
            .await
    }

    /// Make the stored associations of a file equal `desired`.
    ///
    /// Removed associations go first so a property moved to a new
    /// association id never collides with its old join row; orphaned
    /// properties go last.
    async fn apply_associations(
        &self,
        uow: &mut dyn UnitOfWork,
        kind: FileKind,
        file_id: i64,
        desired: Vec<FileProperty>,
        previous: &[FileProperty],
    ) -> Result<()> {
        let removed = AssociationReconciler::removed(previous, &desired);
        for association in &removed {
            if let Some(association_id) = association.id {
                uow.delete_file_property(kind, association_id).await?;
            }
        }

        let kept: HashSet<i64> = previous
            .iter()
            .filter_map(|a| a.id)
            .filter(|id| !removed.iter().any(|r| r.id == Some(*id)))
            .collect();

        for mut association in desired {
            if association.property_id.is_none() {
                let property = association
                    .property
                    .take()
                    .ok_or_else(|| anyhow::anyhow!("unmatched association has no property"))?;
                let property_id = uow.add_property(&property).await?;
                info!(
                    property_id,
                    pid = ?property.pid,
                    pin = ?property.pin,
                    "Added property to inventory"
                );
                association.property_id = Some(property_id);
            }

            match association.id {
                Some(association_id) if kept.contains(&association_id) => {
                    uow.update_file_property(kind, &association).await?;
                }
                _ => {
                    association.id = None;
                    uow.add_file_property(kind, file_id, &association).await?;
                }
            }
        }

        for property_id in self
            .reconciler
            .orphaned_properties(uow, &removed)
            .await?
        {
            uow.delete_property(property_id).await?;
            info!(property_id, "Deleted orphaned property of interest");
        }
        Ok(())
    }
}

fn validate_fields(file: &PimsFile) -> Result<()> {
    if file.status_code.trim().is_empty() {
        return Err(PimsError::Validation(format!(
            "{} status is required",
            file.kind.display_name()
        )));
    }
    Ok(())
}

fn validate_associations(properties: &[FileProperty]) -> Result<()> {
    let mut ids = HashSet::new();
    for (index, association) in properties.iter().enumerate() {
        if let Some(id) = association.id {
            if !ids.insert(id) {
                return Err(PimsError::Validation(format!(
                    "association {id} is listed more than once"
                )));
            }
        }
        match (&association.property, association.resolved_property_id()) {
            (None, None) => {
                return Err(PimsError::Validation(format!(
                    "property {} has neither a property id nor property details",
                    index + 1
                )));
            }
            (Some(property), None) if property.is_unidentified() => {
                return Err(PimsError::Validation(format!(
                    "property {} needs a PID, PIN or location",
                    index + 1
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

fn not_found(kind: FileKind, id: i64) -> PimsError {
    PimsError::NotFound(format!("{} {id}", kind.display_name()))
}

fn stale(current: &PimsFile) -> PimsError {
    PimsError::Concurrency(format!(
        "{} has been modified by another user; reload and try again",
        current.display_number()
    ))
}
