//! Geodesic distance and bearing on the WGS84 ellipsoid.

use std::f64::consts::PI;

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 semi-minor axis in meters.
pub const WGS84_B: f64 = 6_356_752.3142;

const MAX_ITERATIONS: usize = 20;
const CONVERGENCE: f64 = 1.0e-12;

/// Result of the inverse geodesic problem between two points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceAndBearing {
    /// Ellipsoidal distance in meters.
    pub distance: f64,
    /// Bearing at the start point in degrees, `-180..=180`.
    pub initial_bearing: f64,
    /// Bearing at the end point in degrees, `-180..=180`.
    pub final_bearing: f64,
}

/// Computes distance and bearings between two points given in degrees using
/// the inverse formula of Vincenty (NGS, section 4).
///
/// The iteration stops after 20 rounds even if λ has not converged (nearly
/// antipodal points); the last estimate is returned in that case.
pub fn distance_and_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> DistanceAndBearing {
    let to_rad = PI / 180.0;
    let (lat1, lon1, lat2, lon2) = (lat1 * to_rad, lon1 * to_rad, lat2 * to_rad, lon2 * to_rad);

    let a = WGS84_A;
    let b = WGS84_B;
    let f = (a - b) / a;
    let a_sq_minus_b_sq_over_b_sq = (a * a - b * b) / (b * b);

    let l = lon2 - lon1;
    let u1 = ((1.0 - f) * lat1.tan()).atan();
    let u2 = ((1.0 - f) * lat2.tan()).atan();

    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();
    let cos_u1_cos_u2 = cos_u1 * cos_u2;
    let sin_u1_sin_u2 = sin_u1 * sin_u2;

    let mut big_a = 0.0;
    let mut sigma = 0.0;
    let mut delta_sigma = 0.0;
    let mut cos_lambda = 0.0;
    let mut sin_lambda = 0.0;

    let mut lambda = l;
    for _ in 0..MAX_ITERATIONS {
        let lambda_orig = lambda;
        let (sl, cl) = lambda.sin_cos();
        sin_lambda = sl;
        cos_lambda = cl;

        let t1 = cos_u2 * sin_lambda;
        let t2 = cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda;
        let sin_sq_sigma = t1 * t1 + t2 * t2;
        let sin_sigma = sin_sq_sigma.sqrt();
        let cos_sigma = sin_u1_sin_u2 + cos_u1_cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);

        let sin_alpha = if sin_sigma == 0.0 {
            0.0
        } else {
            cos_u1_cos_u2 * sin_lambda / sin_sigma
        };
        let cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        let cos_2sm = if cos_sq_alpha == 0.0 {
            0.0
        } else {
            cos_sigma - 2.0 * sin_u1_sin_u2 / cos_sq_alpha
        };

        let u_sq = cos_sq_alpha * a_sq_minus_b_sq_over_b_sq;
        big_a = 1.0 + (u_sq / 16384.0) * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
        let big_b = (u_sq / 1024.0) * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
        let c = (f / 16.0) * cos_sq_alpha * (4.0 + f * (4.0 - 3.0 * cos_sq_alpha));
        let cos_2sm_sq = cos_2sm * cos_2sm;
        delta_sigma = big_b
            * sin_sigma
            * (cos_2sm
                + (big_b / 4.0)
                    * (cos_sigma * (-1.0 + 2.0 * cos_2sm_sq)
                        - (big_b / 6.0)
                            * cos_2sm
                            * (-3.0 + 4.0 * sin_sigma * sin_sigma)
                            * (-3.0 + 4.0 * cos_2sm_sq)));

        lambda = l
            + (1.0 - c)
                * f
                * sin_alpha
                * (sigma + c * sin_sigma * (cos_2sm + c * cos_sigma * (-1.0 + 2.0 * cos_2sm_sq)));

        // identical points give lambda == 0; treat as converged
        if lambda == 0.0 || ((lambda - lambda_orig) / lambda).abs() < CONVERGENCE {
            break;
        }
    }

    let distance = b * big_a * (sigma - delta_sigma);
    let initial_bearing =
        (cos_u2 * sin_lambda).atan2(cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda) / to_rad;
    let final_bearing =
        (cos_u1 * sin_lambda).atan2(-sin_u1 * cos_u2 + cos_u1 * sin_u2 * cos_lambda) / to_rad;

    DistanceAndBearing {
        distance,
        initial_bearing,
        final_bearing,
    }
}

/// Shorthand for the distance in meters between two points.
#[inline]
pub fn distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    distance_and_bearing(lat1, lon1, lat2, lon2).distance
}
