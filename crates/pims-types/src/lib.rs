//! Domain types for PIMS property associations.
//!
//! Only the fields the reconciliation core reads or writes are modelled:
//! property identifiers and location, the classification codes stamped on
//! newly created inventory, the file/property join rows and the audit notes
//! a file update can emit. Everything here is plain data; behaviour lives in
//! the `pims` crate.

pub mod file;
pub mod lookup;
pub mod note;
pub mod overrides;
pub mod property;
pub mod user;

pub use file::{AssociationCounts, FileKind, FileProperty, PimsFile, PropertyAssociation};
pub use lookup::{Country, ProvinceState};
pub use note::{FileNote, Note};
pub use overrides::{ParseOverrideCodeError, UserOverrideCode, UserOverrideSet};
pub use property::{Address, Property};
pub use user::ActingUser;

pub use pims_spatial::{Location, Srid};
pub use uuid::Uuid;
