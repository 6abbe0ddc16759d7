use std::collections::BTreeMap;

use crate::report::types::{
    DayType, DayTypeService, HourlyDepartures, IsolatedStop, RouteFrequency, RoutePeakService,
    StopLocation,
};
use crate::report::utility::{pct, round_to};

const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Great-circle distance in meters between two WGS84 points.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * a.sqrt().asin()
}

/// Stops whose nearest other stop is farther than `threshold_meters`, most
/// isolated first. A feed with a single stop has nothing to compare against
/// and yields no isolated stops.
pub fn isolated_stops(stops: &[StopLocation], threshold_meters: f64) -> Vec<IsolatedStop> {
    let mut isolated: Vec<IsolatedStop> = stops
        .iter()
        .enumerate()
        .filter_map(|(i, s)| {
            let nearest = stops
                .iter()
                .enumerate()
                .filter(|(j, o)| *j != i && o.stop_id != s.stop_id)
                .map(|(_, o)| haversine_meters(s.stop_lat, s.stop_lon, o.stop_lat, o.stop_lon))
                .fold(f64::INFINITY, f64::min);

            (nearest.is_finite() && nearest > threshold_meters).then(|| IsolatedStop {
                stop_id: s.stop_id.clone(),
                stop_name: s.stop_name.clone(),
                stop_lat: s.stop_lat,
                stop_lon: s.stop_lon,
                nearest_stop_meters: round_to(nearest, 0),
            })
        })
        .collect();

    isolated.sort_by(|a, b| b.nearest_stop_meters.total_cmp(&a.nearest_stop_meters));
    isolated
}

/// Hour with the most departures; the earliest such hour on ties.
pub fn peak_hour(hours: &[HourlyDepartures]) -> Option<i32> {
    hours
        .iter()
        .max_by(|a, b| {
            a.num_departures
                .cmp(&b.num_departures)
                .then(b.hour.cmp(&a.hour))
        })
        .map(|h| h.hour)
}

/// Sums trip counts per day type and attaches each type's share of the total,
/// rounded to one decimal. Output is ordered Weekday, Saturday, Sunday.
pub fn day_type_shares(per_service: &[([bool; 7], i64)]) -> Vec<DayTypeService> {
    let mut totals: BTreeMap<DayType, i64> = BTreeMap::new();
    for (flags, trips) in per_service {
        if let Some(day_type) = DayType::classify(*flags) {
            *totals.entry(day_type).or_default() += trips;
        }
    }

    let grand_total: i64 = totals.values().sum();
    totals
        .into_iter()
        .map(|(day_type, num_trips)| DayTypeService {
            day_type,
            num_trips,
            percentage: round_to(pct(num_trips as usize, grand_total as usize), 1),
        })
        .collect()
}

/// Routes by average trips per service pattern, highest first.
pub fn rank_routes(mut routes: Vec<RouteFrequency>, limit: usize) -> Vec<RouteFrequency> {
    routes.sort_by(|a, b| b.avg_trips_per_service.total_cmp(&a.avg_trips_per_service));
    routes.truncate(limit);
    routes
}

/// Routes by combined morning and evening peak departures, highest first.
pub fn rank_peak_routes(mut routes: Vec<RoutePeakService>, limit: usize) -> Vec<RoutePeakService> {
    routes.retain(|r| r.total_departures > 0);
    routes.sort_by(|a, b| b.peak_trips().cmp(&a.peak_trips()));
    routes.truncate(limit);
    routes
}
