use thiserror::Error;

use crate::location::Srid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpatialError {
    #[error("unsupported spatial reference transform: {from} -> {to}")]
    UnsupportedTransform { from: Srid, to: Srid },

    #[error("coordinate ({x}, {y}) is not finite")]
    NonFinite { x: f64, y: f64 },

    #[error("coordinate ({x}, {y}) is outside the domain of {srid}")]
    OutOfDomain { x: f64, y: f64, srid: Srid },
}

pub type Result<T> = std::result::Result<T, SpatialError>;
