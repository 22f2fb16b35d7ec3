//! Acquisition file flows: split field/property updates, region changes and
//! associations that span file kinds.
//!
//! Run with: cargo test --test acquisition_flows

mod common;

use common::{harness, property_exists, property_of_interest, seed_property, seed_research_file};
use pims::types::{FileKind, FileProperty, PimsFile, Property, UserOverrideCode, UserOverrideSet};
use pims::PimsError;

fn acquisition_file(number: &str) -> PimsFile {
    PimsFile {
        region_code: Some(1),
        ..PimsFile::new(FileKind::AcquisitionFile, "ACTIVE").with_number(number)
    }
}

#[tokio::test]
async fn region_change_requires_override() {
    let h = harness();
    let added = h
        .acquisitions
        .add(&h.user, acquisition_file("AF-1"), &UserOverrideSet::new())
        .await
        .unwrap();
    let moved = PimsFile {
        region_code: Some(2),
        ..added.clone()
    };

    let err = h
        .acquisitions
        .update(&h.user, moved.clone(), &UserOverrideSet::new())
        .await
        .unwrap_err();
    assert_eq!(err.override_code(), Some(UserOverrideCode::UpdateRegion));

    let updated = h
        .acquisitions
        .update(&h.user, moved, &UserOverrideCode::UpdateRegion.into())
        .await
        .unwrap();
    assert_eq!(updated.region_code, Some(2));
    assert_eq!(updated.row_version, Some(added.row_version.unwrap() + 1));
}

#[tokio::test]
async fn first_region_assignment_needs_no_override() {
    let h = harness();
    let added = h
        .acquisitions
        .add(
            &h.user,
            PimsFile::new(FileKind::AcquisitionFile, "ACTIVE"),
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    let updated = h
        .acquisitions
        .update(
            &h.user,
            PimsFile {
                region_code: Some(3),
                ..added
            },
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();
    assert_eq!(updated.region_code, Some(3));
}

#[tokio::test]
async fn field_update_leaves_properties_alone() {
    let h = harness();
    let added = h
        .acquisitions
        .add(
            &h.user,
            acquisition_file("AF-1").with_property(FileProperty::new(Property::with_pid(11))),
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    let updated = h
        .acquisitions
        .update(
            &h.user,
            PimsFile {
                status_code: "CLOSED".into(),
                properties: Vec::new(),
                ..added.clone()
            },
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    assert_eq!(updated.status_code, "CLOSED");
    assert_eq!(updated.properties.len(), 1);
    let notes = h.acquisitions.get_notes(added.id.unwrap()).await.unwrap();
    assert_eq!(
        notes[0].note.text,
        "Acquisition File status changed from ACTIVE to CLOSED"
    );
}

#[tokio::test]
async fn property_update_leaves_fields_alone() {
    let h = harness();
    let added = h
        .acquisitions
        .add(&h.user, acquisition_file("AF-1"), &UserOverrideSet::new())
        .await
        .unwrap();

    let updated = h
        .acquisitions
        .update_properties(
            &h.user,
            PimsFile {
                status_code: "CLOSED".into(),
                ..added
                    .clone()
                    .with_property(FileProperty::new(Property::with_pin(21)))
            },
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    assert_eq!(updated.status_code, "ACTIVE");
    assert_eq!(updated.properties.len(), 1);
    assert!(h
        .acquisitions
        .get_notes(added.id.unwrap())
        .await
        .unwrap()
        .is_empty());

    let listed = h.acquisitions.get_properties(added.id.unwrap()).await.unwrap();
    assert_eq!(listed[0].property.as_ref().unwrap().pin, Some(21));
    assert!(!h
        .acquisitions
        .is_row_version_equal(added.id.unwrap(), added.row_version.unwrap())
        .await
        .unwrap());
}

#[tokio::test]
async fn research_association_keeps_property_of_interest() {
    let h = harness();
    let property_id = seed_property(&h.store, property_of_interest(Property::with_pid(31))).await;
    seed_research_file(&h.store, property_id).await;

    // associations on other kinds of file do not need consent
    let added = h
        .acquisitions
        .add(
            &h.user,
            acquisition_file("AF-1").with_property(FileProperty::new(Property::with_pid(31))),
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    h.acquisitions
        .update_properties(
            &h.user,
            PimsFile {
                properties: Vec::new(),
                ..added
            },
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    assert!(property_exists(&h.store, property_id).await);
}

#[tokio::test]
async fn property_on_another_acquisition_file_names_it() {
    let h = harness();
    h.acquisitions
        .add(
            &h.user,
            acquisition_file("AF-7").with_property(FileProperty::new(Property::with_pin(44))),
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    let err = h
        .acquisitions
        .add(
            &h.user,
            acquisition_file("AF-8").with_property(FileProperty::new(Property::with_pin(44))),
            &UserOverrideSet::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "PIN 44 is attached to Acquisition File # AF-7");
}

#[tokio::test]
async fn duplicate_property_on_one_file_is_rejected() {
    let h = harness();
    let err = h
        .acquisitions
        .add(
            &h.user,
            acquisition_file("AF-1")
                .with_property(FileProperty::new(Property::with_pid(5)))
                .with_property(FileProperty::new(Property::with_pid(5))),
            &UserOverrideSet::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PimsError::Validation(_)));
    assert_eq!(h.store.property_count().await, 0);
}

#[tokio::test]
async fn replacing_a_property_swaps_the_association() {
    let h = harness();
    let removed_id = seed_property(&h.store, property_of_interest(Property::with_pid(61))).await;
    let added = h
        .acquisitions
        .add(
            &h.user,
            acquisition_file("AF-1").with_property(FileProperty::for_property_id(removed_id)),
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    // same association row, different property
    let mut association = added.properties[0].clone();
    association.property_id = None;
    association.property = Some(Property::with_pid(62));
    let updated = h
        .acquisitions
        .update_properties(
            &h.user,
            PimsFile {
                properties: vec![association],
                ..added
            },
            &UserOverrideSet::new(),
        )
        .await
        .unwrap();

    assert_eq!(updated.properties.len(), 1);
    assert_eq!(
        updated.properties[0].property.as_ref().unwrap().pid,
        Some(62)
    );
    assert!(!property_exists(&h.store, removed_id).await);
}
