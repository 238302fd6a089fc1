//! Great-circle distance and geo-time inconsistency scoring.

/// Earth radius used by the Haversine formula, km.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Commercial-flight speed ceiling, km/h. Implied travel faster than
/// this is physically implausible.
pub const MAX_FEASIBLE_SPEED_KMH: f64 = 900.0;

/// Haversine great-circle distance between two coordinates, km.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Inconsistency score in [0, 1] for travelling `distance_km` in
/// `elapsed_secs`.
///
/// Zero elapsed time is maximally inconsistent. Otherwise the score is
/// zero up to the flight ceiling and `min(speed / ceiling, 1)` above it.
pub fn inconsistency_score(distance_km: f64, elapsed_secs: u64) -> f64 {
    if elapsed_secs == 0 {
        return 1.0;
    }

    let required_speed_kmh = distance_km / elapsed_secs as f64 * 3600.0;
    if required_speed_kmh > MAX_FEASIBLE_SPEED_KMH {
        (required_speed_kmh / MAX_FEASIBLE_SPEED_KMH).min(1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero_for_identical_points() {
        assert_eq!(haversine_km(48.85, 2.35, 48.85, 2.35), 0.0);
    }

    #[test]
    fn test_haversine_is_symmetric() {
        let there = haversine_km(40.71, -74.0, 51.5, -0.12);
        let back = haversine_km(51.5, -0.12, 40.71, -74.0);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_haversine_known_distance() {
        // Paris to London, roughly 344 km.
        let distance = haversine_km(48.8566, 2.3522, 51.5074, -0.1278);
        assert!((distance - 344.0).abs() < 5.0, "got {distance}");
    }

    #[test]
    fn test_feasible_speed_scores_zero() {
        // 100 km in 2 hours: 50 km/h.
        assert_eq!(inconsistency_score(100.0, 7200), 0.0);
        // Exactly at the ceiling: 900 km in 1 hour.
        assert_eq!(inconsistency_score(900.0, 3600), 0.0);
    }

    #[test]
    fn test_impossible_speed_scores_positive() {
        // 100 km in 60 seconds: 6000 km/h, capped at 1.
        assert_eq!(inconsistency_score(100.0, 60), 1.0);

        // Any speed above the ceiling saturates the cap.
        assert_eq!(inconsistency_score(1000.0, 3600), 1.0);
    }

    #[test]
    fn test_zero_elapsed_is_maximally_inconsistent() {
        assert_eq!(inconsistency_score(50.0, 0), 1.0);
        assert_eq!(inconsistency_score(0.0, 0), 1.0);
    }
}
