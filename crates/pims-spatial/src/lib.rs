//! Spatial references for PIMS property locations.
//!
//! Canonical storage uses BC Albers (EPSG:3005); the map front end speaks
//! WGS84 longitude/latitude (EPSG:4326). This crate owns the point type that
//! travels with a property and the projection between the two systems.

pub mod albers;
pub mod error;
pub mod location;
pub mod transform;

pub use albers::AlbersEqualArea;
pub use error::{Result, SpatialError};
pub use location::{Location, Srid};
pub use transform::{CoordinateTransform, ProjectionTransformer};

pub use geo_types::Coord;
