//! Row types produced by the network reports.

use serde::Serialize;

use crate::report::utility::{pct, round_to};

/// Headline counts for the loaded network, written as `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkStats {
    pub total_routes: i64,
    pub total_stops: i64,
    pub total_trips: i64,
    pub total_stop_times: i64,
    pub avg_routes_per_stop: f64,
    pub max_routes_at_stop: i64,
    /// Stops served by 5 or more routes.
    pub hub_stops: i64,
    pub single_route_stops: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteFrequency {
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub total_trips: i64,
    pub service_patterns: i64,
    pub avg_trips_per_service: f64,
}

impl RouteFrequency {
    pub fn new(
        route_short_name: Option<String>,
        route_long_name: Option<String>,
        total_trips: i64,
        service_patterns: i64,
    ) -> Self {
        let avg = if service_patterns == 0 {
            0.0
        } else {
            round_to(total_trips as f64 / service_patterns as f64, 2)
        };
        Self {
            route_short_name,
            route_long_name,
            total_trips,
            service_patterns,
            avg_trips_per_service: avg,
        }
    }
}

/// How many stops are served by exactly `routes_serving_stop` routes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityBucket {
    pub routes_serving_stop: i64,
    pub num_stops: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourlyDepartures {
    /// GTFS hour, may be 24 or more for after-midnight service.
    pub hour: i32,
    pub num_departures: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DayType {
    Weekday,
    Saturday,
    Sunday,
}

impl DayType {
    /// Classifies a calendar row by its Monday..Sunday flags. Any weekday
    /// flag wins over the weekend ones.
    pub fn classify(flags: [bool; 7]) -> Option<Self> {
        if flags[..5].iter().any(|f| *f) {
            Some(DayType::Weekday)
        } else if flags[5] {
            Some(DayType::Saturday)
        } else if flags[6] {
            Some(DayType::Sunday)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayTypeService {
    pub day_type: DayType,
    pub num_trips: i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePeakService {
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    /// First departures between 07:00 and 09:59.
    pub morning_peak_trips: i64,
    /// First departures between 16:00 and 18:59.
    pub evening_peak_trips: i64,
    pub off_peak_trips: i64,
    pub total_departures: i64,
    pub peak_percentage: f64,
}

impl RoutePeakService {
    pub fn new(
        route_short_name: Option<String>,
        route_long_name: Option<String>,
        morning_peak_trips: i64,
        evening_peak_trips: i64,
        off_peak_trips: i64,
        total_departures: i64,
    ) -> Self {
        let peak = (morning_peak_trips + evening_peak_trips) as usize;
        Self {
            route_short_name,
            route_long_name,
            morning_peak_trips,
            evening_peak_trips,
            off_peak_trips,
            total_departures,
            peak_percentage: round_to(pct(peak, total_departures.max(0) as usize), 1),
        }
    }

    pub fn peak_trips(&self) -> i64 {
        self.morning_peak_trips + self.evening_peak_trips
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopLocation {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
}

/// Connectivity class of a single stop by the number of routes serving it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityTier {
    Unserved,
    SingleRoute,
    Low,
    Medium,
    Hub,
}

impl ConnectivityTier {
    pub fn classify(routes_serving_stop: i64) -> Self {
        match routes_serving_stop {
            i64::MIN..=0 => ConnectivityTier::Unserved,
            1 => ConnectivityTier::SingleRoute,
            2..=3 => ConnectivityTier::Low,
            4..=5 => ConnectivityTier::Medium,
            _ => ConnectivityTier::Hub,
        }
    }
}

/// One located stop with the routes and trips serving it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopConnectivity {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub routes_serving_stop: i64,
    pub total_trips: i64,
    pub tier: ConnectivityTier,
}

impl StopConnectivity {
    pub fn new(location: StopLocation, routes_serving_stop: i64, total_trips: i64) -> Self {
        Self {
            stop_id: location.stop_id,
            stop_name: location.stop_name,
            stop_lat: location.stop_lat,
            stop_lon: location.stop_lon,
            routes_serving_stop,
            total_trips,
            tier: ConnectivityTier::classify(routes_serving_stop),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsolatedStop {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: f64,
    pub stop_lon: f64,
    pub nearest_stop_meters: f64,
}

/// Everything one `report` run produced; serialized into `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub network: NetworkStats,
    pub peak_hour: Option<i32>,
    pub service_by_day_type: Vec<DayTypeService>,
    pub isolated_stop_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_day_type() {
        let weekday = [true, false, false, false, false, true, true];
        let saturday = [false, false, false, false, false, true, true];
        let sunday = [false, false, false, false, false, false, true];
        assert_eq!(DayType::classify(weekday), Some(DayType::Weekday));
        assert_eq!(DayType::classify(saturday), Some(DayType::Saturday));
        assert_eq!(DayType::classify(sunday), Some(DayType::Sunday));
        assert_eq!(DayType::classify([false; 7]), None);
    }

    #[test]
    fn test_route_frequency_average() {
        let r = RouteFrequency::new(Some("1".into()), None, 10, 3);
        assert_eq!(r.avg_trips_per_service, 3.33);
        let r = RouteFrequency::new(None, None, 10, 0);
        assert_eq!(r.avg_trips_per_service, 0.0);
    }

    #[test]
    fn test_peak_percentage() {
        let r = RoutePeakService::new(Some("9A".into()), None, 3, 2, 5, 10);
        assert_eq!(r.peak_percentage, 50.0);
        assert_eq!(r.peak_trips(), 5);
    }

    #[test]
    fn test_connectivity_tier_bounds() {
        assert_eq!(ConnectivityTier::classify(0), ConnectivityTier::Unserved);
        assert_eq!(ConnectivityTier::classify(1), ConnectivityTier::SingleRoute);
        assert_eq!(ConnectivityTier::classify(3), ConnectivityTier::Low);
        assert_eq!(ConnectivityTier::classify(5), ConnectivityTier::Medium);
        assert_eq!(ConnectivityTier::classify(6), ConnectivityTier::Hub);
    }

    #[test]
    fn test_stop_connectivity_from_location() {
        let location = StopLocation {
            stop_id: "0001".into(),
            stop_name: Some("Barrington St".into()),
            stop_lat: 44.6488,
            stop_lon: -63.5752,
        };
        let s = StopConnectivity::new(location, 0, 0);
        assert_eq!(s.stop_id, "0001");
        assert_eq!(s.tier, ConnectivityTier::Unserved);
    }
}
