use std::sync::Arc;

use tracing::{debug, info};

use pims_spatial::CoordinateTransform;
use pims_types::{FileProperty, Property, UserOverrideCode, UserOverrideSet};

use crate::config::PimsConfig;
use crate::error::{PimsError, Result};
use crate::store::UnitOfWork;

use super::populate::NewPropertyPopulator;

/// Outcome of resolving one submitted association against inventory.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyMatch {
    /// An inventory row was found; it is persisted and carries an id.
    MatchedExisting(Property),
    /// Nothing matched; a fully populated property that still needs inserting.
    Created(Property),
}

impl PropertyMatch {
    pub fn property(&self) -> &Property {
        match self {
            PropertyMatch::MatchedExisting(p) | PropertyMatch::Created(p) => p,
        }
    }

    pub fn is_existing(&self) -> bool {
        matches!(self, PropertyMatch::MatchedExisting(_))
    }
}

/// Resolves submitted property payloads to inventory rows.
///
/// Lookup order is PID, then PIN, then the association's own property id.
/// Only when none of these apply is a new property prepared.
#[derive(Clone)]
pub struct PropertyMatcher {
    transform: Arc<dyn CoordinateTransform>,
    config: Arc<PimsConfig>,
    populator: NewPropertyPopulator,
}

impl PropertyMatcher {
    pub fn new(transform: Arc<dyn CoordinateTransform>, config: Arc<PimsConfig>) -> Self {
        let populator = NewPropertyPopulator::new(Arc::clone(&transform), Arc::clone(&config));
        Self {
            transform,
            config,
            populator,
        }
    }

    pub async fn match_property(
        &self,
        uow: &mut dyn UnitOfWork,
        association: &FileProperty,
        overrides: &UserOverrideSet,
    ) -> Result<PropertyMatch> {
        let incoming = association.property.clone().unwrap_or_default();

        if let Some(pid) = incoming.pid {
            return match uow.find_property_by_pid(pid).await? {
                Some(found) => self.matched(uow, found, &incoming, overrides).await,
                None => {
                    if let Some(pin) = incoming.pin {
                        if let Some(owner) = uow.find_property_by_pin(pin).await? {
                            return Err(pin_taken(pid, pin, &owner));
                        }
                    }
                    debug!(pid, "Adding new property with pid");
                    self.created(uow, incoming).await
                }
            };
        }

        if let Some(pin) = incoming.pin {
            return match uow.find_property_by_pin(pin).await? {
                Some(found) => self.matched(uow, found, &incoming, overrides).await,
                None => {
                    debug!(pin, "Adding new property with pin");
                    self.created(uow, incoming).await
                }
            };
        }

        if let Some(property_id) = association.resolved_property_id() {
            return match uow.find_property(property_id).await? {
                Some(found) => self.matched(uow, found, &incoming, overrides).await,
                None => Err(PimsError::NotFound(format!("property {property_id}"))),
            };
        }

        debug!("Adding new property without a pid or pin");
        self.created(uow, incoming).await
    }

    async fn created(&self, uow: &mut dyn UnitOfWork, incoming: Property) -> Result<PropertyMatch> {
        let property = self.populator.populate(uow, incoming).await?;
        Ok(PropertyMatch::Created(property))
    }

    /// Fill in a missing location on a matched property when the caller supplied one.
    async fn matched(
        &self,
        uow: &mut dyn UnitOfWork,
        mut existing: Property,
        incoming: &Property,
        overrides: &UserOverrideSet,
    ) -> Result<PropertyMatch> {
        let (None, Some(location)) = (existing.location, incoming.location) else {
            return Ok(PropertyMatch::MatchedExisting(existing));
        };

        if !overrides.contains(UserOverrideCode::AddLocationToProperty) {
            return Err(PimsError::override_required(
                UserOverrideCode::AddLocationToProperty,
                "The selected property is already in inventory but has no spatial \
                 location. Do you want to save the selected location on the property?",
            ));
        }

        let id = existing
            .id
            .ok_or_else(|| anyhow::anyhow!("matched property has no id"))?;
        let stored = location.to_srid(self.transform.as_ref(), self.config.spatial.storage_srid)?;
        uow.update_property_location(id, &stored).await?;
        info!(property_id = id, "Added location to existing property");

        existing.location = Some(stored);
        Ok(PropertyMatch::MatchedExisting(existing))
    }
}

/// A new property cannot take a PIN that inventory already assigns elsewhere.
fn pin_taken(pid: i32, pin: i32, owner: &Property) -> PimsError {
    let owner_id = owner.id.map_or_else(|| "?".to_string(), |id| id.to_string());
    let owner_pid = owner
        .pid
        .map_or_else(|| "no PID".to_string(), |p| format!("PID {p}"));
    PimsError::Validation(format!(
        "PID {pid} is not in inventory but PIN {pin} belongs to property {owner_id} ({owner_pid})"
    ))
}
