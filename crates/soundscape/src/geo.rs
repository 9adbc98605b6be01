//! Geographic helpers: great-circle distance and point-set summaries.

use serde::Serialize;

use crate::sound::Coordinates;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points using the haversine formula.
#[must_use]
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Arithmetic center of a set of points; `(0, 0)` when empty.
#[must_use]
pub fn center(points: &[Coordinates]) -> Coordinates {
    if points.is_empty() {
        return Coordinates::new(0.0, 0.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let n = points.len() as f64;
    let (lat, lng) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lng), p| (lat + p.lat, lng + p.lng));
    Coordinates::new(lat / n, lng / n)
}

/// Bounding box of a point set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    /// Southernmost latitude.
    pub min_lat: f64,
    /// Northernmost latitude.
    pub max_lat: f64,
    /// Westernmost longitude.
    pub min_lng: f64,
    /// Easternmost longitude.
    pub max_lng: f64,
}

impl Bounds {
    /// Whether a point lies inside the box (edges included).
    #[must_use]
    pub fn contains(&self, point: Coordinates) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }
}

/// Bounding box of the given points, or `None` when empty.
#[must_use]
pub fn bounds(points: &[Coordinates]) -> Option<Bounds> {
    let first = points.first()?;
    let init = Bounds {
        min_lat: first.lat,
        max_lat: first.lat,
        min_lng: first.lng,
        max_lng: first.lng,
    };
    Some(points.iter().skip(1).fold(init, |b, p| Bounds {
        min_lat: b.min_lat.min(p.lat),
        max_lat: b.max_lat.max(p.lat),
        min_lng: b.min_lng.min(p.lng),
        max_lng: b.max_lng.max(p.lng),
    }))
}

/// Round a coordinate component to `precision` decimal places.
#[must_use]
pub fn round_to(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(i32::try_from(precision).unwrap_or(i32::MAX));
    (value * factor).round() / factor
}
