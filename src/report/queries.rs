//! SQL behind each network report.
//!
//! Stop connectivity (distinct routes serving a stop) is computed inline so
//! the reports only need the loaded feed tables, not any derived views.

use anyhow::{Context, Result};
use tokio_postgres::Client;

use crate::report::types::{
    ConnectivityBucket, HourlyDepartures, NetworkStats, RouteFrequency, RoutePeakService,
    StopConnectivity, StopLocation,
};
use crate::report::utility::{parse_flag, round_to};

const STOP_CONNECTIVITY_CTE: &str = "
    stop_connectivity AS (
        SELECT st.stop_id,
               COUNT(DISTINCT t.route_id) AS routes_serving_stop,
               COUNT(DISTINCT st.trip_id) AS total_trips
        FROM stop_times st
        JOIN trips t ON t.trip_id = st.trip_id
        GROUP BY st.stop_id
    )";

/// Hour component of a GTFS time, kept as written so 25:10:00 stays hour 25.
const DEPARTURE_HOUR: &str = "split_part(trim(departure_time::text), ':', 1)::int4";

#[tracing::instrument(skip(client))]
pub async fn network_stats(client: &Client) -> Result<NetworkStats> {
    let sql = format!(
        "WITH {STOP_CONNECTIVITY_CTE}
         SELECT
            (SELECT COUNT(*) FROM routes),
            (SELECT COUNT(*) FROM stops),
            (SELECT COUNT(*) FROM trips),
            (SELECT COUNT(*) FROM stop_times),
            (SELECT COALESCE(AVG(routes_serving_stop), 0)::float8 FROM stop_connectivity),
            (SELECT COALESCE(MAX(routes_serving_stop), 0) FROM stop_connectivity),
            (SELECT COUNT(*) FROM stop_connectivity WHERE routes_serving_stop >= 5),
            (SELECT COUNT(*) FROM stop_connectivity WHERE routes_serving_stop = 1)"
    );
    let row = client
        .query_one(sql.as_str(), &[])
        .await
        .context("network statistics query failed")?;

    Ok(NetworkStats {
        total_routes: row.try_get(0)?,
        total_stops: row.try_get(1)?,
        total_trips: row.try_get(2)?,
        total_stop_times: row.try_get(3)?,
        avg_routes_per_stop: round_to(row.try_get(4)?, 2),
        max_routes_at_stop: row.try_get(5)?,
        hub_stops: row.try_get(6)?,
        single_route_stops: row.try_get(7)?,
    })
}

#[tracing::instrument(skip(client))]
pub async fn route_frequency(client: &Client) -> Result<Vec<RouteFrequency>> {
    let rows = client
        .query(
            "SELECT r.route_short_name::text, r.route_long_name::text,
                    COUNT(t.trip_id), COUNT(DISTINCT t.service_id)
             FROM routes r
             JOIN trips t ON t.route_id = r.route_id
             GROUP BY r.route_id, r.route_short_name, r.route_long_name",
            &[],
        )
        .await
        .context("route frequency query failed")?;

    rows.iter()
        .map(|row| -> Result<RouteFrequency> {
            Ok(RouteFrequency::new(
                row.try_get(0)?,
                row.try_get(1)?,
                row.try_get(2)?,
                row.try_get(3)?,
            ))
        })
        .collect()
}

#[tracing::instrument(skip(client))]
pub async fn stop_connectivity_distribution(client: &Client) -> Result<Vec<ConnectivityBucket>> {
    let sql = format!(
        "WITH {STOP_CONNECTIVITY_CTE}
         SELECT routes_serving_stop, COUNT(*)
         FROM stop_connectivity
         GROUP BY routes_serving_stop
         ORDER BY routes_serving_stop"
    );
    let rows = client
        .query(sql.as_str(), &[])
        .await
        .context("stop connectivity query failed")?;

    rows.iter()
        .map(|row| -> Result<ConnectivityBucket> {
            Ok(ConnectivityBucket {
                routes_serving_stop: row.try_get(0)?,
                num_stops: row.try_get(1)?,
            })
        })
        .collect()
}

#[tracing::instrument(skip(client))]
pub async fn hourly_departures(client: &Client) -> Result<Vec<HourlyDepartures>> {
    let sql = format!(
        "SELECT {DEPARTURE_HOUR} AS hour, COUNT(*)
         FROM stop_times
         WHERE departure_time IS NOT NULL AND trim(departure_time::text) <> ''
         GROUP BY hour
         ORDER BY hour"
    );
    let rows = client
        .query(sql.as_str(), &[])
        .await
        .context("hourly departures query failed")?;

    rows.iter()
        .map(|row| -> Result<HourlyDepartures> {
            Ok(HourlyDepartures {
                hour: row.try_get(0)?,
                num_departures: row.try_get(1)?,
            })
        })
        .collect()
}

/// Distinct trips per calendar row with that row's Monday..Sunday flags.
#[tracing::instrument(skip(client))]
pub async fn trips_per_service(client: &Client) -> Result<Vec<([bool; 7], i64)>> {
    let rows = client
        .query(
            "SELECT c.monday::text, c.tuesday::text, c.wednesday::text, c.thursday::text,
                    c.friday::text, c.saturday::text, c.sunday::text,
                    COUNT(DISTINCT t.trip_id)
             FROM calendar c
             JOIN trips t ON t.service_id = c.service_id
             GROUP BY c.service_id, c.monday, c.tuesday, c.wednesday, c.thursday,
                      c.friday, c.saturday, c.sunday",
            &[],
        )
        .await
        .context("service by day type query failed")?;

    rows.iter()
        .map(|row| -> Result<([bool; 7], i64)> {
            let mut flags = [false; 7];
            for (i, flag) in flags.iter_mut().enumerate() {
                let raw: Option<String> = row.try_get(i)?;
                *flag = raw.as_deref().is_some_and(parse_flag);
            }
            Ok((flags, row.try_get(7)?))
        })
        .collect()
}

/// Peak and off-peak counts of each trip's first departure, per route.
#[tracing::instrument(skip(client))]
pub async fn peak_service(client: &Client) -> Result<Vec<RoutePeakService>> {
    let sql = format!(
        "WITH first_departures AS (
            SELECT DISTINCT ON (trip_id) trip_id, {DEPARTURE_HOUR} AS hour
            FROM stop_times
            WHERE departure_time IS NOT NULL AND trim(departure_time::text) <> ''
            ORDER BY trip_id, stop_sequence
         )
         SELECT r.route_short_name::text, r.route_long_name::text,
                COUNT(*) FILTER (WHERE fd.hour BETWEEN 7 AND 9),
                COUNT(*) FILTER (WHERE fd.hour BETWEEN 16 AND 18),
                COUNT(*) FILTER (WHERE fd.hour NOT BETWEEN 7 AND 9
                                   AND fd.hour NOT BETWEEN 16 AND 18),
                COUNT(*)
         FROM routes r
         JOIN trips t ON t.route_id = r.route_id
         JOIN first_departures fd ON fd.trip_id = t.trip_id
         GROUP BY r.route_id, r.route_short_name, r.route_long_name"
    );
    let rows = client
        .query(sql.as_str(), &[])
        .await
        .context("peak service query failed")?;

    rows.iter()
        .map(|row| -> Result<RoutePeakService> {
            Ok(RoutePeakService::new(
                row.try_get(0)?,
                row.try_get(1)?,
                row.try_get(2)?,
                row.try_get(3)?,
                row.try_get(4)?,
                row.try_get(5)?,
            ))
        })
        .collect()
}

#[tracing::instrument(skip(client))]
pub async fn stop_locations(client: &Client) -> Result<Vec<StopLocation>> {
    let rows = client
        .query(
            "SELECT stop_id::text, stop_name::text, stop_lat::float8, stop_lon::float8
             FROM stops
             WHERE stop_lat IS NOT NULL AND stop_lon IS NOT NULL",
            &[],
        )
        .await
        .context("stop locations query failed")?;

    rows.iter()
        .map(|row| -> Result<StopLocation> {
            Ok(StopLocation {
                stop_id: row.try_get(0)?,
                stop_name: row.try_get(1)?,
                stop_lat: row.try_get(2)?,
                stop_lon: row.try_get(3)?,
            })
        })
        .collect()
}

/// Every located stop with its connectivity; unserved stops report zero.
#[tracing::instrument(skip(client))]
pub async fn stop_connectivity_by_stop(client: &Client) -> Result<Vec<StopConnectivity>> {
    let sql = format!(
        "WITH {STOP_CONNECTIVITY_CTE}
         SELECT s.stop_id::text, s.stop_name::text, s.stop_lat::float8, s.stop_lon::float8,
                COALESCE(sc.routes_serving_stop, 0), COALESCE(sc.total_trips, 0)
         FROM stops s
         LEFT JOIN stop_connectivity sc ON sc.stop_id = s.stop_id
         WHERE s.stop_lat IS NOT NULL AND s.stop_lon IS NOT NULL
         ORDER BY s.stop_id"
    );
    let rows = client
        .query(sql.as_str(), &[])
        .await
        .context("per-stop connectivity query failed")?;

    rows.iter()
        .map(|row| -> Result<StopConnectivity> {
            let location = StopLocation {
                stop_id: row.try_get(0)?,
                stop_name: row.try_get(1)?,
                stop_lat: row.try_get(2)?,
                stop_lon: row.try_get(3)?,
            };
            Ok(StopConnectivity::new(location, row.try_get(4)?, row.try_get(5)?))
        })
        .collect()
}
