use std::sync::Arc;

use chrono::Utc;

use pims_spatial::CoordinateTransform;
use pims_types::Property;

use crate::config::PimsConfig;
use crate::error::Result;
use crate::store::UnitOfWork;

/// Fills the mandatory fields of a property entering inventory for the first time.
///
/// Reads lookup tables through the unit of work but never writes; the
/// returned property is inserted by the orchestrator.
#[derive(Clone)]
pub struct NewPropertyPopulator {
    transform: Arc<dyn CoordinateTransform>,
    config: Arc<PimsConfig>,
}

impl NewPropertyPopulator {
    pub fn new(transform: Arc<dyn CoordinateTransform>, config: Arc<PimsConfig>) -> Self {
        Self { transform, config }
    }

    pub async fn populate(&self, uow: &mut dyn UnitOfWork, mut property: Property) -> Result<Property> {
        let defaults = &self.config.defaults;
        let unknown = || Some(defaults.unknown_code.clone());

        property.id = None;
        property.row_version = None;
        property.classification_code = unknown();
        property.property_type_code = unknown();
        property.status_code = unknown();
        property.surplus_declaration_code = unknown();
        property.data_source_code = Some(defaults.data_source_code.clone());
        property.data_source_effective_date = Some(Utc::now().date_naive());
        property.is_property_of_interest = false;
        property.is_owned = false;

        if let Some(address) = property.address.as_mut() {
            let province = uow
                .provinces()
                .await?
                .into_iter()
                .find(|p| p.code == defaults.province_code);
            if let Some(province) = province {
                address.province_state_id = Some(province.id);
            }

            let country = uow
                .countries()
                .await?
                .into_iter()
                .find(|c| c.code == defaults.country_code);
            if let Some(country) = country {
                address.country_id = Some(country.id);
            }
        }

        if let Some(location) = property.location {
            property.location =
                Some(location.to_srid(self.transform.as_ref(), self.config.spatial.storage_srid)?);
        }

        Ok(property)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PimsError;
    use crate::store::{MemoryStore, PimsStore};
    use pims_spatial::{Location, ProjectionTransformer, Srid};
    use pims_types::Address;

    fn populator() -> NewPropertyPopulator {
        NewPropertyPopulator::new(
            Arc::new(ProjectionTransformer::new()),
            Arc::new(PimsConfig::default()),
        )
    }

    #[tokio::test]
    async fn stamps_unknown_codes_and_data_source() {
        let store = MemoryStore::with_reference_data();
        let mut uow = store.begin().await.unwrap();

        let property = populator()
            .populate(uow.as_mut(), Property::with_pid(123456789))
            .await
            .unwrap();

        assert_eq!(property.pid, Some(123456789));
        assert_eq!(property.classification_code.as_deref(), Some("UNKNOWN"));
        assert_eq!(property.property_type_code.as_deref(), Some("UNKNOWN"));
        assert_eq!(property.status_code.as_deref(), Some("UNKNOWN"));
        assert_eq!(property.surplus_declaration_code.as_deref(), Some("UNKNOWN"));
        assert_eq!(property.data_source_code.as_deref(), Some("PMBC"));
        assert!(property.data_source_effective_date.is_some());
        assert!(!property.is_property_of_interest);
        assert!(property.id.is_none());
    }

    #[tokio::test]
    async fn resolves_province_and_country_for_address() {
        let store = MemoryStore::with_reference_data();
        let mut uow = store.begin().await.unwrap();
        let incoming = Property {
            address: Some(Address {
                street_address: Some("940 Blanshard St".into()),
                ..Address::default()
            }),
            ..Property::with_pin(42)
        };

        let property = populator().populate(uow.as_mut(), incoming).await.unwrap();
        let address = property.address.unwrap();
        assert_eq!(address.province_state_id, Some(1));
        assert_eq!(address.country_id, Some(1));
    }

    #[tokio::test]
    async fn missing_lookup_rows_leave_address_unset() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let incoming = Property {
            address: Some(Address::default()),
            ..Property::with_pin(42)
        };

        let property = populator().populate(uow.as_mut(), incoming).await.unwrap();
        let address = property.address.unwrap();
        assert_eq!(address.province_state_id, None);
        assert_eq!(address.country_id, None);
    }

    #[tokio::test]
    async fn converts_location_to_storage_projection() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        let property = populator()
            .populate(uow.as_mut(), Property::at(Location::wgs84(-123.3656, 48.4284)))
            .await
            .unwrap();
        let location = property.location.unwrap();
        assert_eq!(location.srid, Srid::BC_ALBERS);
        assert!(location.x() > 1_000_000.0);
    }

    #[tokio::test]
    async fn storage_projection_is_left_alone() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let albers = Location::bc_albers(1_195_000.0, 383_000.0);

        let property = populator()
            .populate(uow.as_mut(), Property::at(albers))
            .await
            .unwrap();
        assert_eq!(property.location, Some(albers));
    }

    #[tokio::test]
    async fn unsupported_source_projection_fails() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();

        let err = populator()
            .populate(
                uow.as_mut(),
                Property::at(Location::new(500_000.0, 5_400_000.0, Srid(26910))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PimsError::Configuration(_)));
    }
}
