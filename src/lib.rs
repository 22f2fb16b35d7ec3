//! PIMS property-association reconciliation.
//!
//! Attaching properties to leases, acquisition files and research files:
//! matching submitted properties against inventory, creating the ones that
//! are new, refusing silent reuse of a property already on another file, and
//! removing properties of interest that no file references any more. Each
//! file update runs in a single [`store::UnitOfWork`].

pub mod api;
pub mod config;
pub mod error;
pub mod property;
pub mod reconcile;
pub mod service;
pub mod store;

pub use api::{ErrorResponse, FileUpdateRequest};
pub use config::PimsConfig;
pub use error::{PimsError, Result};
pub use property::{NewPropertyPopulator, PropertyMatch, PropertyMatcher};
pub use reconcile::AssociationReconciler;
pub use service::{AcquisitionFileService, FileUpdateOrchestrator, LeaseService};
pub use store::{MemoryStore, PimsStore, UnitOfWork};

pub use pims_spatial as spatial;
pub use pims_types as types;
