//! In-memory store for tests and local development.
//!
//! A unit of work holds the store lock for its whole lifetime and edits a
//! private copy of the state; commit swaps the copy in. Units of work are
//! therefore fully serialized, which is stronger isolation than `PgStore`
//! provides.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use pims_types::{
    AssociationCounts, Country, FileKind, FileNote, FileProperty, Location, PimsFile, Property,
    PropertyAssociation, ProvinceState,
};

use super::{PimsStore, UnitOfWork};

#[derive(Debug, Clone)]
struct AssociationRow {
    kind: FileKind,
    file_id: i64,
    property_id: i64,
    property_name: Option<String>,
    row_version: i64,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    last_id: i64,
    properties: BTreeMap<i64, Property>,
    /// File headers; `properties` is always empty here.
    files: BTreeMap<(FileKind, i64), PimsFile>,
    associations: BTreeMap<i64, AssociationRow>,
    notes: Vec<FileNote>,
    provinces: Vec<ProvinceState>,
    countries: Vec<Country>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn file_number(&self, kind: FileKind, file_id: i64) -> Option<String> {
        self.files
            .get(&(kind, file_id))
            .and_then(|f| f.file_number.clone())
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with BC/AB provinces and CA/US countries loaded.
    pub fn with_reference_data() -> Self {
        Self::with_lookups(
            vec![
                ProvinceState {
                    id: 1,
                    code: "BC".into(),
                    description: Some("British Columbia".into()),
                },
                ProvinceState {
                    id: 2,
                    code: "AB".into(),
                    description: Some("Alberta".into()),
                },
            ],
            vec![
                Country {
                    id: 1,
                    code: "CA".into(),
                    description: Some("Canada".into()),
                },
                Country {
                    id: 2,
                    code: "US".into(),
                    description: Some("United States of America".into()),
                },
            ],
        )
    }

    pub fn with_lookups(provinces: Vec<ProvinceState>, countries: Vec<Country>) -> Self {
        let state = MemoryState {
            provinces,
            countries,
            ..MemoryState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub async fn property_count(&self) -> usize {
        self.state.lock().await.properties.len()
    }
}

#[async_trait]
impl PimsStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl MemoryUnitOfWork {
    fn association(&self, id: i64, row: &AssociationRow) -> FileProperty {
        FileProperty {
            id: Some(id),
            file_id: Some(row.file_id),
            property_id: Some(row.property_id),
            property_name: row.property_name.clone(),
            property: self.working.properties.get(&row.property_id).cloned(),
            row_version: Some(row.row_version),
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn find_property(&mut self, id: i64) -> Result<Option<Property>> {
        Ok(self.working.properties.get(&id).cloned())
    }

    async fn find_property_by_pid(&mut self, pid: i32) -> Result<Option<Property>> {
        Ok(self
            .working
            .properties
            .values()
            .find(|p| p.pid == Some(pid))
            .cloned())
    }

    async fn find_property_by_pin(&mut self, pin: i32) -> Result<Option<Property>> {
        Ok(self
            .working
            .properties
            .values()
            .find(|p| p.pin == Some(pin))
            .cloned())
    }

    async fn add_property(&mut self, property: &Property) -> Result<i64> {
        if let Some(pid) = property.pid {
            if self.working.properties.values().any(|p| p.pid == Some(pid)) {
                bail!("duplicate key: a property with PID {pid} already exists");
            }
        }
        if let Some(pin) = property.pin {
            if self.working.properties.values().any(|p| p.pin == Some(pin)) {
                bail!("duplicate key: a property with PIN {pin} already exists");
            }
        }

        let id = self.working.next_id();
        let mut stored = property.clone();
        stored.id = Some(id);
        stored.row_version = Some(1);
        if let Some(address) = stored.address.as_mut() {
            if address.id.is_none() {
                address.id = Some(self.working.next_id());
            }
        }
        self.working.properties.insert(id, stored);
        Ok(id)
    }

    async fn update_property_location(&mut self, id: i64, location: &Location) -> Result<()> {
        let property = self
            .working
            .properties
            .get_mut(&id)
            .ok_or_else(|| anyhow!("property {id} does not exist"))?;
        property.location = Some(*location);
        property.row_version = Some(property.row_version.unwrap_or(0) + 1);
        Ok(())
    }

    async fn delete_property(&mut self, id: i64) -> Result<()> {
        if let Some((assoc_id, _)) = self
            .working
            .associations
            .iter()
            .find(|(_, row)| row.property_id == id)
        {
            bail!("property {id} is still referenced by association {assoc_id}");
        }
        self.working
            .properties
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("property {id} does not exist"))
    }

    async fn associations_for_property(
        &mut self,
        kind: FileKind,
        property_id: i64,
    ) -> Result<Vec<PropertyAssociation>> {
        Ok(self
            .working
            .associations
            .iter()
            .filter(|(_, row)| row.kind == kind && row.property_id == property_id)
            .map(|(id, row)| PropertyAssociation {
                kind,
                association_id: *id,
                file_id: row.file_id,
                file_number: self.working.file_number(kind, row.file_id),
            })
            .collect())
    }

    async fn association_counts(&mut self, property_id: i64) -> Result<AssociationCounts> {
        let mut counts = AssociationCounts::default();
        for row in self.working.associations.values() {
            if row.property_id == property_id {
                counts.increment(row.kind);
            }
        }
        Ok(counts)
    }

    async fn provinces(&mut self) -> Result<Vec<ProvinceState>> {
        Ok(self.working.provinces.clone())
    }

    async fn countries(&mut self) -> Result<Vec<Country>> {
        Ok(self.working.countries.clone())
    }

    async fn load_file(&mut self, kind: FileKind, id: i64) -> Result<Option<PimsFile>> {
        let Some(header) = self.working.files.get(&(kind, id)).cloned() else {
            return Ok(None);
        };
        let properties = self.file_properties(kind, id).await?;
        Ok(Some(PimsFile {
            properties,
            ..header
        }))
    }

    async fn file_row_version(&mut self, kind: FileKind, id: i64) -> Result<Option<i64>> {
        Ok(self
            .working
            .files
            .get(&(kind, id))
            .and_then(|f| f.row_version))
    }

    async fn insert_file(&mut self, file: &PimsFile) -> Result<i64> {
        let id = self.working.next_id();
        let header = PimsFile {
            id: Some(id),
            row_version: Some(1),
            properties: Vec::new(),
            ..file.clone()
        };
        self.working.files.insert((file.kind, id), header);
        Ok(id)
    }

    async fn update_file(&mut self, file: &PimsFile) -> Result<Option<i64>> {
        let id = file
            .id
            .ok_or_else(|| anyhow!("cannot update a {} without an id", file.kind))?;
        let existing = self
            .working
            .files
            .get_mut(&(file.kind, id))
            .ok_or_else(|| anyhow!("{} {id} does not exist", file.kind))?;
        if existing.row_version != file.row_version {
            return Ok(None);
        }
        let next_version = existing.row_version.unwrap_or(0) + 1;
        existing.file_number = file.file_number.clone();
        existing.file_name = file.file_name.clone();
        existing.status_code = file.status_code.clone();
        existing.region_code = file.region_code;
        existing.row_version = Some(next_version);
        Ok(Some(next_version))
    }

    async fn file_properties(&mut self, kind: FileKind, file_id: i64) -> Result<Vec<FileProperty>> {
        Ok(self
            .working
            .associations
            .iter()
            .filter(|(_, row)| row.kind == kind && row.file_id == file_id)
            .map(|(id, row)| self.association(*id, row))
            .collect())
    }

    async fn add_file_property(
        &mut self,
        kind: FileKind,
        file_id: i64,
        association: &FileProperty,
    ) -> Result<i64> {
        let property_id = association
            .property_id
            .ok_or_else(|| anyhow!("association has no property id"))?;
        if !self.working.properties.contains_key(&property_id) {
            bail!("foreign key violation: property {property_id} does not exist");
        }
        if !self.working.files.contains_key(&(kind, file_id)) {
            bail!("foreign key violation: {kind} {file_id} does not exist");
        }
        if self
            .working
            .associations
            .values()
            .any(|row| row.kind == kind && row.file_id == file_id && row.property_id == property_id)
        {
            bail!("duplicate key: property {property_id} is already on {kind} {file_id}");
        }

        let id = self.working.next_id();
        self.working.associations.insert(
            id,
            AssociationRow {
                kind,
                file_id,
                property_id,
                property_name: association.property_name.clone(),
                row_version: 1,
            },
        );
        Ok(id)
    }

    async fn update_file_property(
        &mut self,
        kind: FileKind,
        association: &FileProperty,
    ) -> Result<()> {
        let id = association
            .id
            .ok_or_else(|| anyhow!("cannot update an association without an id"))?;
        let row = self
            .working
            .associations
            .get_mut(&id)
            .filter(|row| row.kind == kind)
            .ok_or_else(|| anyhow!("{kind} association {id} does not exist"))?;
        if row.property_name != association.property_name {
            row.property_name = association.property_name.clone();
            row.row_version += 1;
        }
        Ok(())
    }

    async fn delete_file_property(&mut self, kind: FileKind, association_id: i64) -> Result<()> {
        match self.working.associations.get(&association_id) {
            Some(row) if row.kind == kind => {
                self.working.associations.remove(&association_id);
                Ok(())
            }
            _ => Err(anyhow!("{kind} association {association_id} does not exist")),
        }
    }

    async fn add_note(&mut self, note: &FileNote) -> Result<i64> {
        let id = self.working.next_id();
        let mut stored = note.clone();
        stored.note.id = Some(id);
        self.working.notes.push(stored);
        Ok(id)
    }

    async fn file_notes(&mut self, kind: FileKind, file_id: i64) -> Result<Vec<FileNote>> {
        Ok(self
            .working
            .notes
            .iter()
            .filter(|n| n.kind == kind && n.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
