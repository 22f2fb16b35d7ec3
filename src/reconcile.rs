//! Cross-file association rules.
//!
//! Decides which submitted associations may be attached to a file, which
//! previous associations were dropped, and which dropped properties no file
//! references any more.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use pims_spatial::CoordinateTransform;
use pims_types::{FileProperty, PimsFile, Property, UserOverrideCode, UserOverrideSet};

use crate::config::PimsConfig;
use crate::error::{PimsError, Result};
use crate::property::PropertyMatch;
use crate::store::UnitOfWork;

#[derive(Clone)]
pub struct AssociationReconciler {
    transform: Arc<dyn CoordinateTransform>,
    config: Arc<PimsConfig>,
}

impl AssociationReconciler {
    pub fn new(transform: Arc<dyn CoordinateTransform>, config: Arc<PimsConfig>) -> Self {
        Self { transform, config }
    }

    /// Apply the cross-file rule to every matched association.
    ///
    /// Existing properties come back referenced by id with no payload; new
    /// ones keep their populated payload and have no `property_id` yet.
    /// Nothing is written.
    pub async fn reconcile(
        &self,
        uow: &mut dyn UnitOfWork,
        file: &PimsFile,
        matched: Vec<(FileProperty, PropertyMatch)>,
        overrides: &UserOverrideSet,
    ) -> Result<Vec<FileProperty>> {
        let mut seen_ids = HashSet::new();
        let mut seen_pids = HashSet::new();
        let mut seen_pins = HashSet::new();
        let mut resolved = Vec::with_capacity(matched.len());

        for (association, found) in matched {
            let property = found.property();
            let duplicate = property.id.is_some_and(|id| !seen_ids.insert(id))
                || property.pid.is_some_and(|pid| !seen_pids.insert(pid))
                || property.pin.is_some_and(|pin| !seen_pins.insert(pin));
            if duplicate {
                return Err(PimsError::Validation(format!(
                    "{} is listed more than once on {}",
                    self.describe(property)?,
                    file.display_number()
                )));
            }

            match found {
                PropertyMatch::MatchedExisting(property) => {
                    let property_id = property
                        .id
                        .ok_or_else(|| anyhow::anyhow!("matched property has no id"))?;
                    let existing = uow.associations_for_property(file.kind, property_id).await?;

                    let on_this_file = existing.iter().any(|a| Some(a.file_id) == file.id);
                    let other_file = existing.iter().find(|a| Some(a.file_id) != file.id);

                    if let Some(other) = other_file {
                        if !on_this_file
                            && !overrides.contains(UserOverrideCode::AddPropertyToInventory)
                        {
                            let message = format!(
                                "{} is attached to {}",
                                self.describe(&property)?,
                                other.display_number()
                            );
                            warn!(property_id, file = %file.display_number(), "{message}");
                            return Err(PimsError::override_required(
                                UserOverrideCode::AddPropertyToInventory,
                                message,
                            ));
                        }
                    }

                    resolved.push(FileProperty {
                        property_id: Some(property_id),
                        property: None,
                        ..association
                    });
                }
                PropertyMatch::Created(property) => {
                    resolved.push(FileProperty {
                        property_id: None,
                        property: Some(property),
                        ..association
                    });
                }
            }
        }

        Ok(resolved)
    }

    /// Previous associations that the desired set no longer contains.
    ///
    /// An association survives only when the desired set keeps the same
    /// association id pointing at the same property.
    pub fn removed(previous: &[FileProperty], desired: &[FileProperty]) -> Vec<FileProperty> {
        previous
            .iter()
            .filter(|old| {
                !desired.iter().any(|new| {
                    new.id.is_some()
                        && new.id == old.id
                        && new.property_id.is_some()
                        && new.property_id == old.property_id
                })
            })
            .cloned()
            .collect()
    }

    /// Properties of interest left without any association.
    ///
    /// Must run after the removed associations have been deleted in `uow`.
    pub async fn orphaned_properties(
        &self,
        uow: &mut dyn UnitOfWork,
        removed: &[FileProperty],
    ) -> Result<Vec<i64>> {
        let mut orphans = Vec::new();
        for association in removed {
            let Some(property_id) = association.resolved_property_id() else {
                continue;
            };
            if orphans.contains(&property_id) {
                continue;
            }
            let Some(property) = uow.find_property(property_id).await? else {
                continue;
            };
            if !property.is_property_of_interest {
                continue;
            }

            let remaining = uow.association_counts(property_id).await?;
            if remaining.total() == 0 {
                orphans.push(property_id);
            } else {
                debug!(
                    property_id,
                    leases = remaining.leases,
                    research_files = remaining.research_files,
                    acquisition_files = remaining.acquisition_files,
                    "Property of interest still referenced"
                );
            }
        }
        Ok(orphans)
    }

    /// "PID 123456789", "PIN 42" or "Lng/Lat -123.100000, 49.200000".
    fn describe(&self, property: &Property) -> Result<String> {
        if let Some(pid) = property.pid {
            return Ok(format!("PID {pid}"));
        }
        if let Some(pin) = property.pin {
            return Ok(format!("PIN {pin}"));
        }
        if let Some(location) = property.location {
            let shown = location.to_srid(self.transform.as_ref(), self.config.spatial.geographic_srid)?;
            return Ok(format!("Lng/Lat {:.6}, {:.6}", shown.x(), shown.y()));
        }
        Ok(match property.id {
            Some(id) => format!("Property {id}"),
            None => "Property".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, PimsStore};
    use pims_spatial::{Location, ProjectionTransformer};
    use pims_types::FileKind;
    use proptest::prelude::*;

    fn reconciler() -> AssociationReconciler {
        AssociationReconciler::new(
            Arc::new(ProjectionTransformer::new()),
            Arc::new(PimsConfig::default()),
        )
    }

    /// A property already on lease "10".
    async fn shared_property(uow: &mut dyn UnitOfWork, property: Property) -> (Property, i64) {
        let property_id = uow.add_property(&property).await.unwrap();
        let lease_id = uow
            .insert_file(&PimsFile::new(FileKind::Lease, "ACTIVE").with_number("10"))
            .await
            .unwrap();
        uow.add_file_property(FileKind::Lease, lease_id, &FileProperty::for_property_id(property_id))
            .await
            .unwrap();
        let stored = uow.find_property(property_id).await.unwrap().unwrap();
        (stored, lease_id)
    }

    async fn second_lease(uow: &mut dyn UnitOfWork) -> PimsFile {
        let file = PimsFile::new(FileKind::Lease, "DRAFT").with_number("20");
        let id = uow.insert_file(&file).await.unwrap();
        PimsFile { id: Some(id), ..file }
    }

    #[tokio::test]
    async fn property_on_other_file_requires_override() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let (property, _) = shared_property(uow.as_mut(), Property::with_pid(123456789)).await;
        let file = second_lease(uow.as_mut()).await;

        let matched = vec![(
            FileProperty::new(Property::with_pid(123456789)),
            PropertyMatch::MatchedExisting(property),
        )];
        let err = reconciler()
            .reconcile(uow.as_mut(), &file, matched, &UserOverrideSet::new())
            .await
            .unwrap_err();

        assert_eq!(err.override_code(), Some(UserOverrideCode::AddPropertyToInventory));
        assert_eq!(err.to_string(), "PID 123456789 is attached to L-File # 10");
    }

    #[tokio::test]
    async fn override_accepts_and_references_by_id() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let (property, _) = shared_property(uow.as_mut(), Property::with_pin(77)).await;
        let file = second_lease(uow.as_mut()).await;
        let property_id = property.id;

        let matched = vec![(
            FileProperty::new(Property::with_pin(77)),
            PropertyMatch::MatchedExisting(property),
        )];
        let resolved = reconciler()
            .reconcile(
                uow.as_mut(),
                &file,
                matched,
                &UserOverrideCode::AddPropertyToInventory.into(),
            )
            .await
            .unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].property_id, property_id);
        assert!(resolved[0].property.is_none());
    }

    #[tokio::test]
    async fn confirmed_association_does_not_reraise() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let (property, _) = shared_property(uow.as_mut(), Property::with_pid(5)).await;
        let file = second_lease(uow.as_mut()).await;
        uow.add_file_property(
            FileKind::Lease,
            file.id.unwrap(),
            &FileProperty::for_property_id(property.id.unwrap()),
        )
        .await
        .unwrap();

        let matched = vec![(
            FileProperty::for_property_id(property.id.unwrap()),
            PropertyMatch::MatchedExisting(property),
        )];
        let resolved = reconciler()
            .reconcile(uow.as_mut(), &file, matched, &UserOverrideSet::new())
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
    }

    #[tokio::test]
    async fn coordinates_identify_property_without_pid_or_pin() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let wgs84 = Location::wgs84(-123.1, 49.2);
        let albers = wgs84
            .to_srid(&ProjectionTransformer::new(), pims_spatial::Srid::BC_ALBERS)
            .unwrap();
        let (property, _) = shared_property(uow.as_mut(), Property::at(albers)).await;
        let file = second_lease(uow.as_mut()).await;

        let matched = vec![(
            FileProperty::for_property_id(property.id.unwrap()),
            PropertyMatch::MatchedExisting(property),
        )];
        let err = reconciler()
            .reconcile(uow.as_mut(), &file, matched, &UserOverrideSet::new())
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Lng/Lat -123.100000, 49.200000 is attached to L-File # 10"
        );
    }

    #[tokio::test]
    async fn duplicate_property_is_validation_error() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let file = second_lease(uow.as_mut()).await;
        let created = || {
            (
                FileProperty::new(Property::with_pid(9)),
                PropertyMatch::Created(Property::with_pid(9)),
            )
        };

        let err = reconciler()
            .reconcile(uow.as_mut(), &file, vec![created(), created()], &UserOverrideSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PimsError::Validation(_)));
    }

    #[tokio::test]
    async fn reconcile_twice_gives_same_set() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let (property, _) = shared_property(uow.as_mut(), Property::with_pid(5)).await;
        let file = second_lease(uow.as_mut()).await;
        let overrides: UserOverrideSet = UserOverrideCode::AddPropertyToInventory.into();
        let matched = vec![
            (
                FileProperty::new(Property::with_pid(5)),
                PropertyMatch::MatchedExisting(property),
            ),
            (
                FileProperty::new(Property::with_pin(6)),
                PropertyMatch::Created(Property::with_pin(6)),
            ),
        ];

        let first = reconciler()
            .reconcile(uow.as_mut(), &file, matched.clone(), &overrides)
            .await
            .unwrap();
        let second = reconciler()
            .reconcile(uow.as_mut(), &file, matched, &overrides)
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    fn assoc(id: i64, property_id: i64) -> FileProperty {
        FileProperty {
            id: Some(id),
            ..FileProperty::for_property_id(property_id)
        }
    }

    #[test]
    fn removed_diffs_by_association_id() {
        let previous = vec![assoc(1, 10), assoc(2, 20), assoc(3, 30)];
        let desired = vec![assoc(1, 10), assoc(3, 31), FileProperty::for_property_id(40)];

        let removed = AssociationReconciler::removed(&previous, &desired);
        let ids: Vec<_> = removed.iter().filter_map(|a| a.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    proptest! {
        #[test]
        fn removed_is_stable_when_nothing_changes(ids in proptest::collection::btree_set(1i64..500, 0..20)) {
            let previous: Vec<_> = ids.iter().map(|id| assoc(*id, id * 10)).collect();
            prop_assert!(AssociationReconciler::removed(&previous, &previous).is_empty());
            prop_assert_eq!(AssociationReconciler::removed(&previous, &[]).len(), previous.len());
        }
    }

    #[tokio::test]
    async fn orphans_only_unreferenced_properties_of_interest() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let of_interest = Property {
            is_property_of_interest: true,
            ..Property::with_pid(1)
        };
        let orphan = uow.add_property(&of_interest).await.unwrap();
        let owned = uow.add_property(&Property::with_pid(2)).await.unwrap();
        let shared = uow
            .add_property(&Property {
                is_property_of_interest: true,
                ..Property::with_pid(3)
            })
            .await
            .unwrap();
        let research_id = uow
            .insert_file(&PimsFile::new(FileKind::ResearchFile, "ACTIVE"))
            .await
            .unwrap();
        uow.add_file_property(
            FileKind::ResearchFile,
            research_id,
            &FileProperty::for_property_id(shared),
        )
        .await
        .unwrap();

        let removed = vec![assoc(100, orphan), assoc(101, owned), assoc(102, shared), assoc(103, orphan)];
        let orphans = reconciler()
            .orphaned_properties(uow.as_mut(), &removed)
            .await
            .unwrap();
        assert_eq!(orphans, vec![orphan]);

        uow.delete_property(orphan).await.unwrap();
        let again = reconciler()
            .orphaned_properties(uow.as_mut(), &removed)
            .await
            .unwrap();
        assert!(again.is_empty());
    }
}
