//! Shared setup for the service-level integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use pims::spatial::ProjectionTransformer;
use pims::types::{ActingUser, FileKind, FileProperty, PimsFile, Property};
use pims::{
    AcquisitionFileService, FileUpdateOrchestrator, LeaseService, MemoryStore, PimsConfig,
    PimsStore, UnitOfWork,
};

pub struct Harness {
    pub store: MemoryStore,
    pub orchestrator: Arc<FileUpdateOrchestrator>,
    pub leases: LeaseService,
    pub acquisitions: AcquisitionFileService,
    pub user: ActingUser,
}

pub fn harness() -> Harness {
    let store = MemoryStore::with_reference_data();
    let orchestrator = Arc::new(
        FileUpdateOrchestrator::new(
            Arc::new(store.clone()),
            Arc::new(ProjectionTransformer::new()),
            Arc::new(PimsConfig::default()),
        )
        .expect("default configuration is valid"),
    );
    Harness {
        leases: LeaseService::new(Arc::clone(&orchestrator)),
        acquisitions: AcquisitionFileService::new(Arc::clone(&orchestrator)),
        orchestrator,
        store,
        user: ActingUser::new("jdoe"),
    }
}

/// Insert a property straight into inventory, bypassing the services.
pub async fn seed_property(store: &MemoryStore, property: Property) -> i64 {
    let mut uow = store.begin().await.unwrap();
    let id = uow.add_property(&property).await.unwrap();
    uow.commit().await.unwrap();
    id
}

/// Attach a property to a research file created on the spot.
pub async fn seed_research_file(store: &MemoryStore, property_id: i64) -> i64 {
    let mut uow = store.begin().await.unwrap();
    let file_id = uow
        .insert_file(&PimsFile::new(FileKind::ResearchFile, "ACTIVE").with_number("R-100"))
        .await
        .unwrap();
    uow.add_file_property(
        FileKind::ResearchFile,
        file_id,
        &FileProperty::for_property_id(property_id),
    )
    .await
    .unwrap();
    uow.commit().await.unwrap();
    file_id
}

pub async fn property_exists(store: &MemoryStore, id: i64) -> bool {
    let mut uow = store.begin().await.unwrap();
    uow.find_property(id).await.unwrap().is_some()
}

pub fn lease(number: &str) -> PimsFile {
    PimsFile::new(FileKind::Lease, "DRAFT").with_number(number)
}

pub fn property_of_interest(property: Property) -> Property {
    Property {
        is_property_of_interest: true,
        ..property
    }
}
