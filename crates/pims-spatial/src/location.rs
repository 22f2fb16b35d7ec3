use std::fmt;

use geo_types::Coord;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::transform::CoordinateTransform;

/// Spatial reference system identifier (EPSG code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Srid(pub i32);

impl Srid {
    /// Geographic longitude/latitude, degrees.
    pub const WGS84: Srid = Srid(4326);
    /// NAD83 / BC Albers, metres. Canonical storage projection.
    pub const BC_ALBERS: Srid = Srid(3005);

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn is_geographic(self) -> bool {
        self == Srid::WGS84
    }
}

impl fmt::Display for Srid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// A point geometry tagged with the reference system its coordinate is in.
///
/// For geographic systems `x` is longitude and `y` is latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub coordinate: Coord<f64>,
    pub srid: Srid,
}

impl Location {
    pub fn new(x: f64, y: f64, srid: Srid) -> Self {
        Self {
            coordinate: Coord { x, y },
            srid,
        }
    }

    pub fn wgs84(longitude: f64, latitude: f64) -> Self {
        Self::new(longitude, latitude, Srid::WGS84)
    }

    pub fn bc_albers(easting: f64, northing: f64) -> Self {
        Self::new(easting, northing, Srid::BC_ALBERS)
    }

    pub fn x(&self) -> f64 {
        self.coordinate.x
    }

    pub fn y(&self) -> f64 {
        self.coordinate.y
    }

    /// Re-express this location in `target`. Returns a copy when already there.
    pub fn to_srid(&self, transform: &dyn CoordinateTransform, target: Srid) -> Result<Location> {
        if self.srid == target {
            return Ok(*self);
        }
        let coordinate = transform.transform(self.srid, target, self.coordinate)?;
        Ok(Location {
            coordinate,
            srid: target,
        })
    }
}
