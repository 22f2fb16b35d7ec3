//! Persistence ports for the reconciliation core.
//!
//! The core never talks to a database directly. A file update opens one
//! [`UnitOfWork`] through [`PimsStore::begin`], performs every read and write
//! through it, then calls [`UnitOfWork::commit`]. Dropping a unit of work
//! without committing discards all of its writes.

pub mod memory;
#[cfg(feature = "database")]
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use pims_types::{
    AssociationCounts, Country, FileKind, FileNote, FileProperty, Location, PimsFile, Property,
    PropertyAssociation, ProvinceState,
};

pub use memory::MemoryStore;
#[cfg(feature = "database")]
pub use postgres::PgStore;

#[async_trait]
pub trait PimsStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// One transaction scope.
#[async_trait]
pub trait UnitOfWork: Send {
    // ── Property inventory ──

    async fn find_property(&mut self, id: i64) -> Result<Option<Property>>;
    async fn find_property_by_pid(&mut self, pid: i32) -> Result<Option<Property>>;
    async fn find_property_by_pin(&mut self, pin: i32) -> Result<Option<Property>>;

    /// Insert a new property (and its address). Returns the new id.
    async fn add_property(&mut self, property: &Property) -> Result<i64>;

    /// Overwrite only the location of an existing property.
    async fn update_property_location(&mut self, id: i64, location: &Location) -> Result<()>;

    /// Delete a property. Fails while any association still references it.
    async fn delete_property(&mut self, id: i64) -> Result<()>;

    // ── Associations, property side ──

    async fn associations_for_property(
        &mut self,
        kind: FileKind,
        property_id: i64,
    ) -> Result<Vec<PropertyAssociation>>;

    async fn association_counts(&mut self, property_id: i64) -> Result<AssociationCounts>;

    // ── Lookups ──

    async fn provinces(&mut self) -> Result<Vec<ProvinceState>>;
    async fn countries(&mut self) -> Result<Vec<Country>>;

    // ── Files ──

    /// Load a file with its associations and their properties.
    async fn load_file(&mut self, kind: FileKind, id: i64) -> Result<Option<PimsFile>>;

    async fn file_row_version(&mut self, kind: FileKind, id: i64) -> Result<Option<i64>>;

    /// Insert the file header. Associations are added separately. Returns the new id.
    async fn insert_file(&mut self, file: &PimsFile) -> Result<i64>;

    /// Persist scalar fields and bump the row version.
    ///
    /// Returns the new row version, or `None` when `file.row_version` no
    /// longer matches the stored one.
    async fn update_file(&mut self, file: &PimsFile) -> Result<Option<i64>>;

    // ── Associations, file side ──

    async fn file_properties(&mut self, kind: FileKind, file_id: i64) -> Result<Vec<FileProperty>>;

    /// Insert a join row. Returns the association id.
    async fn add_file_property(
        &mut self,
        kind: FileKind,
        file_id: i64,
        association: &FileProperty,
    ) -> Result<i64>;

    /// Update mutable join-row fields (property name) of an existing association.
    async fn update_file_property(&mut self, kind: FileKind, association: &FileProperty)
        -> Result<()>;

    async fn delete_file_property(&mut self, kind: FileKind, association_id: i64) -> Result<()>;

    // ── Notes ──

    async fn add_note(&mut self, note: &FileNote) -> Result<i64>;
    async fn file_notes(&mut self, kind: FileKind, file_id: i64) -> Result<Vec<FileNote>>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
