use geo_types::Coord;

use crate::albers::AlbersEqualArea;
use crate::error::{Result, SpatialError};
use crate::location::Srid;

/// Point transformation between spatial reference systems.
///
/// Implementations are pure: no I/O, no shared mutable state.
pub trait CoordinateTransform: Send + Sync {
    fn transform(&self, source: Srid, target: Srid, coordinate: Coord<f64>) -> Result<Coord<f64>>;

    fn supports(&self, source: Srid, target: Srid) -> bool;
}

/// WGS84 <-> BC Albers.
///
/// NAD83 and WGS84 are treated as coincident (null datum shift), the same
/// assumption PostGIS/PROJ make for EPSG:3005 without a grid.
#[derive(Debug, Clone)]
pub struct ProjectionTransformer {
    bc_albers: AlbersEqualArea,
}

impl ProjectionTransformer {
    pub fn new() -> Self {
        Self {
            bc_albers: AlbersEqualArea::bc_albers(),
        }
    }
}

impl Default for ProjectionTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateTransform for ProjectionTransformer {
    fn transform(&self, source: Srid, target: Srid, coordinate: Coord<f64>) -> Result<Coord<f64>> {
        if !self.supports(source, target) {
            return Err(SpatialError::UnsupportedTransform {
                from: source,
                to: target,
            });
        }
        if !coordinate.x.is_finite() || !coordinate.y.is_finite() {
            return Err(SpatialError::NonFinite {
                x: coordinate.x,
                y: coordinate.y,
            });
        }

        let (x, y) = match (source, target) {
            (s, t) if s == t => (coordinate.x, coordinate.y),
            (Srid::WGS84, Srid::BC_ALBERS) => self.bc_albers.forward(coordinate.x, coordinate.y)?,
            (Srid::BC_ALBERS, Srid::WGS84) => self.bc_albers.inverse(coordinate.x, coordinate.y)?,
            _ => {
                return Err(SpatialError::UnsupportedTransform {
                    from: source,
                    to: target,
                })
            }
        };
        Ok(Coord { x, y })
    }

    fn supports(&self, source: Srid, target: Srid) -> bool {
        let known = |s: Srid| s == Srid::WGS84 || s == Srid::BC_ALBERS;
        known(source) && known(target)
    }
}
