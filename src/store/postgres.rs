//! Postgres/PostGIS implementation of the store ports.
//!
//! All SQL is runtime-checked (sqlx::query, not sqlx::query!) so building
//! does not need a database. Table names are chosen per [`FileKind`] from a
//! fixed list, never from input. Locations live in `geometry(Point, 3005)`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};

use pims_types::{
    Address, AssociationCounts, Country, FileKind, FileNote, FileProperty, Location, Note,
    PimsFile, Property, PropertyAssociation, ProvinceState, Srid, Uuid,
};

use super::{PimsStore, UnitOfWork};
use crate::config::DatabaseConfig;

const SCHEMA: &str = include_str!("../../migrations/0001_pims_core.sql");

/// Columns read for every property, aliased so association queries can share them.
const PROPERTY_COLUMNS: &str = r#"
    p.property_id, p.pid, p.pin,
    ST_X(p.location) AS location_x, ST_Y(p.location) AS location_y,
    ST_SRID(p.location) AS location_srid,
    p.classification_code, p.property_type_code, p.status_code,
    p.surplus_declaration_code, p.data_source_code, p.data_source_effective_date,
    p.is_property_of_interest, p.is_owned,
    p.concurrency_control_number AS property_version,
    a.address_id, a.street_address, a.municipality, a.postal_code,
    a.province_state_id, a.country_id
"#;

const PROPERTY_FROM: &str =
    "pims_property p LEFT JOIN pims_address a ON a.address_id = p.address_id";

/// Per-kind table and key names.
struct FileTables {
    file: &'static str,
    file_key: &'static str,
    join: &'static str,
    join_key: &'static str,
}

fn tables(kind: FileKind) -> FileTables {
    match kind {
        FileKind::Lease => FileTables {
            file: "pims_lease",
            file_key: "lease_id",
            join: "pims_property_lease",
            join_key: "property_lease_id",
        },
        FileKind::AcquisitionFile => FileTables {
            file: "pims_acquisition_file",
            file_key: "acquisition_file_id",
            join: "pims_property_acquisition_file",
            join_key: "property_acquisition_file_id",
        },
        FileKind::ResearchFile => FileTables {
            file: "pims_research_file",
            file_key: "research_file_id",
            join: "pims_property_research_file",
            join_key: "property_research_file_id",
        },
    }
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(&config.url)
            .await
            .with_context(|| "failed to connect to the PIMS database")?;
        tracing::info!(max_connections = config.max_connections, "Connected to database");
        Ok(Self::new(pool))
    }

    /// Create the tables this store needs when they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(())
    }

}

#[async_trait]
impl PimsStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(|e| anyhow!(e))?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    async fn find_property_where(&mut self, predicate: &str, value: i64) -> Result<Option<Property>> {
        let sql = format!("SELECT {PROPERTY_COLUMNS} FROM {PROPERTY_FROM} WHERE {predicate} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        row.as_ref().map(property_from_row).transpose()
    }

    async fn insert_address(&mut self, address: &Address) -> Result<i64> {
        let (address_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO pims_address
                (street_address, municipality, postal_code, province_state_id, country_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING address_id
            "#,
        )
        .bind(&address.street_address)
        .bind(&address.municipality)
        .bind(&address.postal_code)
        .bind(address.province_state_id)
        .bind(address.country_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(address_id)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_property(&mut self, id: i64) -> Result<Option<Property>> {
        self.find_property_where("p.property_id", id).await
    }

    async fn find_property_by_pid(&mut self, pid: i32) -> Result<Option<Property>> {
        self.find_property_where("p.pid", i64::from(pid)).await
    }

    async fn find_property_by_pin(&mut self, pin: i32) -> Result<Option<Property>> {
        self.find_property_where("p.pin", i64::from(pin)).await
    }

    async fn add_property(&mut self, property: &Property) -> Result<i64> {
        let address_id = match &property.address {
            Some(address) => Some(self.insert_address(address).await?),
            None => None,
        };
        let location = property.location;

        let (property_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO pims_property
                (pid, pin, location, address_id,
                 classification_code, property_type_code, status_code,
                 surplus_declaration_code, data_source_code, data_source_effective_date,
                 is_property_of_interest, is_owned)
            VALUES ($1, $2,
                    CASE WHEN $3::float8 IS NULL THEN NULL
                         ELSE ST_SetSRID(ST_MakePoint($3, $4), $5) END,
                    $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING property_id
            "#,
        )
        .bind(property.pid)
        .bind(property.pin)
        .bind(location.map(|l| l.x()))
        .bind(location.map(|l| l.y()))
        .bind(location.map(|l| l.srid.code()))
        .bind(address_id)
        .bind(&property.classification_code)
        .bind(&property.property_type_code)
        .bind(&property.status_code)
        .bind(&property.surplus_declaration_code)
        .bind(&property.data_source_code)
        .bind(property.data_source_effective_date)
        .bind(property.is_property_of_interest)
        .bind(property.is_owned)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(property_id)
    }

    async fn update_property_location(&mut self, id: i64, location: &Location) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE pims_property
            SET location = ST_SetSRID(ST_MakePoint($2, $3), $4),
                concurrency_control_number = concurrency_control_number + 1
            WHERE property_id = $1
            "#,
        )
        .bind(id)
        .bind(location.x())
        .bind(location.y())
        .bind(location.srid.code())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("property {id} does not exist"));
        }
        Ok(())
    }

    async fn delete_property(&mut self, id: i64) -> Result<()> {
        let row: Option<(Option<i64>,)> =
            sqlx::query_as("DELETE FROM pims_property WHERE property_id = $1 RETURNING address_id")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await
                .with_context(|| format!("failed to delete property {id}"))?;
        let (address_id,) = row.ok_or_else(|| anyhow!("property {id} does not exist"))?;

        if let Some(address_id) = address_id {
            sqlx::query("DELETE FROM pims_address WHERE address_id = $1")
                .bind(address_id)
                .execute(&mut *self.tx)
                .await
                .map_err(|e| anyhow!(e))?;
        }
        Ok(())
    }

    async fn associations_for_property(
        &mut self,
        kind: FileKind,
        property_id: i64,
    ) -> Result<Vec<PropertyAssociation>> {
        let t = tables(kind);
        let sql = format!(
            r#"
            SELECT j.{join_key}, j.{file_key}, f.file_number
            FROM {join} j
            JOIN {file} f ON f.{file_key} = j.{file_key}
            WHERE j.property_id = $1
            ORDER BY j.{join_key}
            "#,
            join_key = t.join_key,
            file_key = t.file_key,
            join = t.join,
            file = t.file,
        );
        let rows = sqlx::query_as::<_, (i64, i64, Option<String>)>(&sql)
            .bind(property_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(rows
            .into_iter()
            .map(|(association_id, file_id, file_number)| PropertyAssociation {
                kind,
                association_id,
                file_id,
                file_number,
            })
            .collect())
    }

    async fn association_counts(&mut self, property_id: i64) -> Result<AssociationCounts> {
        let (leases, research_files, acquisition_files): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM pims_property_lease WHERE property_id = $1),
                (SELECT COUNT(*) FROM pims_property_research_file WHERE property_id = $1),
                (SELECT COUNT(*) FROM pims_property_acquisition_file WHERE property_id = $1)
            "#,
        )
        .bind(property_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(AssociationCounts {
            leases: usize::try_from(leases)?,
            research_files: usize::try_from(research_files)?,
            acquisition_files: usize::try_from(acquisition_files)?,
        })
    }

    async fn provinces(&mut self) -> Result<Vec<ProvinceState>> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT province_state_id, code, description FROM pims_province_state ORDER BY province_state_id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows
            .into_iter()
            .map(|(id, code, description)| ProvinceState {
                id,
                code,
                description,
            })
            .collect())
    }

    async fn countries(&mut self) -> Result<Vec<Country>> {
        let rows = sqlx::query_as::<_, (i64, String, Option<String>)>(
            "SELECT country_id, code, description FROM pims_country ORDER BY country_id",
        )
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows
            .into_iter()
            .map(|(id, code, description)| Country {
                id,
                code,
                description,
            })
            .collect())
    }

    async fn load_file(&mut self, kind: FileKind, id: i64) -> Result<Option<PimsFile>> {
        let t = tables(kind);
        let sql = format!(
            r#"
            SELECT file_number, file_name, status_code, region_code, concurrency_control_number
            FROM {file}
            WHERE {file_key} = $1
            "#,
            file = t.file,
            file_key = t.file_key,
        );
        let row = sqlx::query_as::<_, (Option<String>, Option<String>, String, Option<i16>, i64)>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        let Some((file_number, file_name, status_code, region_code, row_version)) = row else {
            return Ok(None);
        };

        let properties = self.file_properties(kind, id).await?;
        Ok(Some(PimsFile {
            kind,
            id: Some(id),
            file_number,
            file_name,
            status_code,
            region_code,
            row_version: Some(row_version),
            properties,
        }))
    }

    async fn file_row_version(&mut self, kind: FileKind, id: i64) -> Result<Option<i64>> {
        let t = tables(kind);
        let sql = format!(
            "SELECT concurrency_control_number FROM {} WHERE {} = $1",
            t.file, t.file_key
        );
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(|(version,)| version))
    }

    async fn insert_file(&mut self, file: &PimsFile) -> Result<i64> {
        let t = tables(file.kind);
        let sql = format!(
            r#"
            INSERT INTO {file} (file_number, file_name, status_code, region_code)
            VALUES ($1, $2, $3, $4)
            RETURNING {file_key}
            "#,
            file = t.file,
            file_key = t.file_key,
        );
        let (id,): (i64,) = sqlx::query_as(&sql)
            .bind(&file.file_number)
            .bind(&file.file_name)
            .bind(&file.status_code)
            .bind(file.region_code)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(id)
    }

    async fn update_file(&mut self, file: &PimsFile) -> Result<Option<i64>> {
        let id = file
            .id
            .ok_or_else(|| anyhow!("cannot update a {} without an id", file.kind))?;
        let t = tables(file.kind);
        let sql = format!(
            r#"
            UPDATE {file}
            SET file_number = $2,
                file_name = $3,
                status_code = $4,
                region_code = $5,
                concurrency_control_number = concurrency_control_number + 1
            WHERE {file_key} = $1 AND concurrency_control_number = $6
            RETURNING concurrency_control_number
            "#,
            file = t.file,
            file_key = t.file_key,
        );
        let row: Option<(i64,)> = sqlx::query_as(&sql)
            .bind(id)
            .bind(&file.file_number)
            .bind(&file.file_name)
            .bind(&file.status_code)
            .bind(file.region_code)
            .bind(file.row_version)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(row.map(|(version,)| version))
    }

    async fn file_properties(&mut self, kind: FileKind, file_id: i64) -> Result<Vec<FileProperty>> {
        let t = tables(kind);
        let sql = format!(
            r#"
            SELECT j.{join_key} AS association_id, j.property_name,
                   j.concurrency_control_number AS association_version,
                   {PROPERTY_COLUMNS}
            FROM {join} j
            JOIN pims_property p ON p.property_id = j.property_id
            LEFT JOIN pims_address a ON a.address_id = p.address_id
            WHERE j.{file_key} = $1
            ORDER BY j.{join_key}
            "#,
            join_key = t.join_key,
            join = t.join,
            file_key = t.file_key,
        );
        let rows = sqlx::query(&sql)
            .bind(file_id)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;

        rows.iter()
            .map(|row| {
                let property = property_from_row(row)?;
                Ok(FileProperty {
                    id: Some(row.try_get("association_id")?),
                    file_id: Some(file_id),
                    property_id: property.id,
                    property_name: row.try_get("property_name")?,
                    property: Some(property),
                    row_version: Some(row.try_get("association_version")?),
                })
            })
            .collect()
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
        let t = tables(kind);
        let sql = format!(
            r#"
            INSERT INTO {join} ({file_key}, property_id, property_name)
            VALUES ($1, $2, $3)
            RETURNING {join_key}
            "#,
            join = t.join,
            file_key = t.file_key,
            join_key = t.join_key,
        );
        let (id,): (i64,) = sqlx::query_as(&sql)
            .bind(file_id)
            .bind(property_id)
            .bind(&association.property_name)
            .fetch_one(&mut *self.tx)
            .await
            .with_context(|| format!("failed to attach property {property_id} to {kind} {file_id}"))?;
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
        let t = tables(kind);
        let sql = format!(
            r#"
            UPDATE {join}
            SET property_name = $2,
                concurrency_control_number = concurrency_control_number + 1
            WHERE {join_key} = $1 AND property_name IS DISTINCT FROM $2
            "#,
            join = t.join,
            join_key = t.join_key,
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(&association.property_name)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn delete_file_property(&mut self, kind: FileKind, association_id: i64) -> Result<()> {
        let t = tables(kind);
        let sql = format!("DELETE FROM {} WHERE {} = $1", t.join, t.join_key);
        let result = sqlx::query(&sql)
            .bind(association_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| anyhow!(e))?;
        if result.rows_affected() == 0 {
            return Err(anyhow!("{kind} association {association_id} does not exist"));
        }
        Ok(())
    }

    async fn add_note(&mut self, note: &FileNote) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO pims_file_note
                (file_kind, file_id, note_txt, is_system_generated, created_by,
                 created_by_guid, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING note_id
            "#,
        )
        .bind(note.kind.as_ref())
        .bind(note.file_id)
        .bind(&note.note.text)
        .bind(note.note.is_system_generated)
        .bind(&note.note.created_by)
        .bind(note.note.created_by_guid)
        .bind(note.note.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(id)
    }

    async fn file_notes(&mut self, kind: FileKind, file_id: i64) -> Result<Vec<FileNote>> {
        let rows = sqlx::query_as::<_, NoteRow>(
            r#"
            SELECT note_id, note_txt, is_system_generated, created_by, created_by_guid, created_at
            FROM pims_file_note
            WHERE file_kind = $1 AND file_id = $2
            ORDER BY note_id
            "#,
        )
        .bind(kind.as_ref())
        .bind(file_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(rows
            .into_iter()
            .map(
                |(id, text, is_system_generated, created_by, created_by_guid, created_at)| {
                    FileNote {
                        kind,
                        file_id,
                        note: Note {
                            id: Some(id),
                            text,
                            is_system_generated,
                            created_by,
                            created_by_guid,
                            created_at,
                        },
                    }
                },
            )
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(|e| anyhow!(e))
    }
}

type NoteRow = (i64, String, bool, String, Option<Uuid>, DateTime<Utc>);

fn property_from_row(row: &PgRow) -> Result<Property> {
    let location = match (
        row.try_get::<Option<f64>, _>("location_x")?,
        row.try_get::<Option<f64>, _>("location_y")?,
        row.try_get::<Option<i32>, _>("location_srid")?,
    ) {
        (Some(x), Some(y), Some(srid)) => Some(Location::new(x, y, Srid(srid))),
        _ => None,
    };

    let address = match row.try_get::<Option<i64>, _>("address_id")? {
        Some(address_id) => Some(Address {
            id: Some(address_id),
            street_address: row.try_get("street_address")?,
            municipality: row.try_get("municipality")?,
            postal_code: row.try_get("postal_code")?,
            province_state_id: row.try_get("province_state_id")?,
            country_id: row.try_get("country_id")?,
        }),
        None => None,
    };

    Ok(Property {
        id: Some(row.try_get("property_id")?),
        pid: row.try_get("pid")?,
        pin: row.try_get("pin")?,
        location,
        address,
        classification_code: row.try_get("classification_code")?,
        property_type_code: row.try_get("property_type_code")?,
        status_code: row.try_get("status_code")?,
        surplus_declaration_code: row.try_get("surplus_declaration_code")?,
        data_source_code: row.try_get("data_source_code")?,
        data_source_effective_date: row.try_get::<Option<NaiveDate>, _>("data_source_effective_date")?,
        is_property_of_interest: row.try_get("is_property_of_interest")?,
        is_owned: row.try_get("is_owned")?,
        row_version: Some(row.try_get("property_version")?),
    })
}
