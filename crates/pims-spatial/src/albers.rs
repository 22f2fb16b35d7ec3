//! Ellipsoidal Albers equal-area conic projection.
//!
//! Forward and inverse formulas follow Snyder, *Map Projections: A Working
//! Manual* (USGS PP 1395), equations 3-12, 14-3 to 14-6 and 14-18 to 14-21.
//! The inverse recovers latitude by fixed-point iteration on eq. 3-16.

use crate::error::{Result, SpatialError};
use crate::location::Srid;

const MAX_ITERATIONS: usize = 20;
const CONVERGENCE_RAD: f64 = 1e-12;

/// Reference ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semi_major: f64,
    pub inverse_flattening: f64,
}

impl Ellipsoid {
    /// GRS 1980, the ellipsoid of NAD83.
    pub const GRS80: Ellipsoid = Ellipsoid {
        semi_major: 6_378_137.0,
        inverse_flattening: 298.257_222_101,
    };

    fn eccentricity_squared(&self) -> f64 {
        let f = 1.0 / self.inverse_flattening;
        2.0 * f - f * f
    }
}

/// A configured Albers projection with its derived constants.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbersEqualArea {
    srid: Srid,
    a: f64,
    e: f64,
    e2: f64,
    n: f64,
    c: f64,
    rho0: f64,
    lon0: f64,
    false_easting: f64,
    false_northing: f64,
}

impl AlbersEqualArea {
    /// Build a projection. Angles are in degrees.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        srid: Srid,
        ellipsoid: Ellipsoid,
        latitude_of_origin: f64,
        standard_parallel_1: f64,
        standard_parallel_2: f64,
        central_meridian: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let a = ellipsoid.semi_major;
        let e2 = ellipsoid.eccentricity_squared();
        let e = e2.sqrt();

        let phi0 = latitude_of_origin.to_radians();
        let phi1 = standard_parallel_1.to_radians();
        let phi2 = standard_parallel_2.to_radians();

        let m1 = m(phi1, e2);
        let m2 = m(phi2, e2);
        let q0 = q(phi0.sin(), e, e2);
        let q1 = q(phi1.sin(), e, e2);
        let q2 = q(phi2.sin(), e, e2);

        let n = if (phi1 - phi2).abs() < f64::EPSILON {
            phi1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        let c = m1 * m1 + n * q1;
        let rho0 = a * (c - n * q0).sqrt() / n;

        Self {
            srid,
            a,
            e,
            e2,
            n,
            c,
            rho0,
            lon0: central_meridian.to_radians(),
            false_easting,
            false_northing,
        }
    }

    /// NAD83 / BC Albers (EPSG:3005).
    pub fn bc_albers() -> Self {
        Self::new(
            Srid::BC_ALBERS,
            Ellipsoid::GRS80,
            45.0,
            50.0,
            58.5,
            -126.0,
            1_000_000.0,
            0.0,
        )
    }

    pub fn srid(&self) -> Srid {
        self.srid
    }

    /// Geographic (longitude, latitude) in degrees to projected (x, y) in metres.
    pub fn forward(&self, longitude: f64, latitude: f64) -> Result<(f64, f64)> {
        if !longitude.is_finite() || !latitude.is_finite() {
            return Err(SpatialError::NonFinite {
                x: longitude,
                y: latitude,
            });
        }
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(SpatialError::OutOfDomain {
                x: longitude,
                y: latitude,
                srid: Srid::WGS84,
            });
        }

        let phi = latitude.to_radians();
        let q = q(phi.sin(), self.e, self.e2);
        let radicand = self.c - self.n * q;
        if radicand < 0.0 {
            return Err(SpatialError::OutOfDomain {
                x: longitude,
                y: latitude,
                srid: Srid::WGS84,
            });
        }

        let rho = self.a * radicand.sqrt() / self.n;
        let theta = self.n * normalize_radians(longitude.to_radians() - self.lon0);

        let x = self.false_easting + rho * theta.sin();
        let y = self.false_northing + self.rho0 - rho * theta.cos();
        Ok((x, y))
    }

    /// Projected (x, y) in metres to geographic (longitude, latitude) in degrees.
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64)> {
        if !x.is_finite() || !y.is_finite() {
            return Err(SpatialError::NonFinite { x, y });
        }
        let out_of_domain = || SpatialError::OutOfDomain { x, y, srid: self.srid };

        let dx = x - self.false_easting;
        let dy = self.rho0 - (y - self.false_northing);
        let (rho, theta) = if self.n < 0.0 {
            (-(dx * dx + dy * dy).sqrt(), (-dx).atan2(-dy))
        } else {
            ((dx * dx + dy * dy).sqrt(), dx.atan2(dy))
        };

        let q = (self.c - (rho * self.n / self.a).powi(2)) / self.n;
        let half_q = q / 2.0;
        if !(-1.0..=1.0).contains(&half_q) {
            return Err(out_of_domain());
        }

        let mut phi = half_q.asin();
        let mut converged = false;
        for _ in 0..MAX_ITERATIONS {
            let sin_phi = phi.sin();
            let cos_phi = phi.cos();
            if cos_phi.abs() < f64::EPSILON {
                break;
            }
            let one_minus = 1.0 - self.e2 * sin_phi * sin_phi;
            let delta = one_minus * one_minus / (2.0 * cos_phi)
                * (q / (1.0 - self.e2) - sin_phi / one_minus
                    + (1.0 / (2.0 * self.e))
                        * ((1.0 - self.e * sin_phi) / (1.0 + self.e * sin_phi)).ln());
            phi += delta;
            if delta.abs() < CONVERGENCE_RAD {
                converged = true;
                break;
            }
        }
        if !converged || !phi.is_finite() {
            return Err(out_of_domain());
        }

        let lambda = normalize_radians(self.lon0 + theta / self.n);
        Ok((lambda.to_degrees(), phi.to_degrees()))
    }
}

/// Snyder eq. 14-15.
fn m(phi: f64, e2: f64) -> f64 {
    let sin_phi = phi.sin();
    phi.cos() / (1.0 - e2 * sin_phi * sin_phi).sqrt()
}

/// Snyder eq. 3-12.
fn q(sin_phi: f64, e: f64, e2: f64) -> f64 {
    let e_sin = e * sin_phi;
    (1.0 - e2)
        * (sin_phi / (1.0 - e_sin * e_sin) - (1.0 / (2.0 * e)) * ((1.0 - e_sin) / (1.0 + e_sin)).ln())
}

fn normalize_radians(mut angle: f64) -> f64 {
    use std::f64::consts::PI;
    while angle > PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}
