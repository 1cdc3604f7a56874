//! Great-circle distance and coordinate quantization for cache keys.

use crate::error::WeatherError;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Two records closer than this are the same place
pub const DEDUP_RADIUS_KM: f64 = 1.0;

/// Weather and forecast keys: ~11 km buckets
pub const COARSE_DECIMALS: u32 = 1;

/// Reverse-geocode keys: ~11 m buckets
pub const FINE_DECIMALS: u32 = 4;

/// Haversine distance between two points, in kilometres.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// True when the two points are strictly closer than `radius_km`.
pub fn within_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64, radius_km: f64) -> bool {
    haversine_km(lat1, lon1, lat2, lon2) < radius_km
}

/// Round a coordinate to `decimals` places.
pub fn quantize(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let rounded = (value * factor).round() / factor;
    // Avoid "-0.0" keys for values that round to zero from below
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Cache key for a coordinate pair at the given precision, e.g. "15.0,121.0".
pub fn coordinate_key(latitude: f64, longitude: f64, decimals: u32) -> String {
    let precision = decimals as usize;
    format!(
        "{:.*},{:.*}",
        precision,
        quantize(latitude, decimals),
        precision,
        quantize(longitude, decimals)
    )
}

/// Key shared by weather and forecast entries.
pub fn coarse_key(latitude: f64, longitude: f64) -> String {
    coordinate_key(latitude, longitude, COARSE_DECIMALS)
}

/// Key for reverse-geocode entries.
pub fn fine_key(latitude: f64, longitude: f64) -> String {
    coordinate_key(latitude, longitude, FINE_DECIMALS)
}

/// Reject NaN, infinite, or out-of-range coordinates.
pub fn validate_coordinates(latitude: f64, longitude: f64) -> Result<(), WeatherError> {
    let valid = latitude.is_finite()
        && longitude.is_finite()
        && (-90.0..=90.0).contains(&latitude)
        && (-180.0..=180.0).contains(&longitude);

    if valid {
        Ok(())
    } else {
        Err(WeatherError::InvalidCoordinates {
            latitude,
            longitude,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Manila to Cabanatuan is roughly 100 km
        let d = haversine_km(14.5995, 120.9842, 15.4865, 120.9667);
        assert!((d - 98.6).abs() < 1.5, "distance was {}", d);
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        assert!(haversine_km(15.0, 121.0, 15.0, 121.0).abs() < 1e-9);
    }

    #[test]
    fn test_within_km_boundaries() {
        // 0.0045 degrees of latitude is ~0.5 km, 0.018 is ~2 km
        assert!(within_km(15.0, 121.0, 15.0045, 121.0, DEDUP_RADIUS_KM));
        assert!(!within_km(15.0, 121.0, 15.018, 121.0, DEDUP_RADIUS_KM));
    }

    #[test]
    fn test_nearby_points_share_coarse_key() {
        assert_eq!(coarse_key(14.999, 120.001), "15.0,120.0");
        assert_eq!(coarse_key(15.04, 120.04), "15.0,120.0");
        assert_ne!(coarse_key(15.06, 120.0), coarse_key(15.04, 120.0));
    }

    #[test]
    fn test_fine_key_precision() {
        assert_eq!(fine_key(15.79344, 120.99201), "15.7934,120.9920");
    }

    #[test]
    fn test_quantize_never_negative_zero() {
        assert_eq!(coarse_key(-0.01, -0.04), "0.0,0.0");
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(15.0, 121.0).is_ok());
        assert!(validate_coordinates(-90.0, 180.0).is_ok());
        assert!(validate_coordinates(90.1, 0.0).is_err());
        assert!(validate_coordinates(0.0, -180.5).is_err());
        assert!(validate_coordinates(f64::NAN, 0.0).is_err());
    }
}
