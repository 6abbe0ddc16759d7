//! Descriptive reports over a loaded feed.
//!
//! Each report is one SQL query plus light reshaping in Rust. Results are
//! written as CSV tables, with the headline numbers in `summary.json`.

pub mod aggregate;
pub mod queries;
pub mod types;
pub mod utility;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tokio_postgres::Client;
use tracing::info;

use crate::output::write_table;
use crate::report::aggregate::{
    day_type_shares, isolated_stops, peak_hour, rank_peak_routes, rank_routes,
};
use crate::report::types::ReportSummary;

/// Routes listed in the frequency report.
pub const TOP_ROUTES: usize = 20;
/// Routes listed in the peak service report.
pub const TOP_PEAK_ROUTES: usize = 15;
/// Distance beyond which a stop counts as isolated.
pub const ISOLATION_THRESHOLD_METERS: f64 = 500.0;

/// Runs every report and writes the results into `output_dir`.
#[tracing::instrument(skip(client, output_dir), fields(output_dir = %output_dir.display()))]
pub async fn generate_reports(client: &Client, output_dir: &Path) -> Result<ReportSummary> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("cannot create {}", output_dir.display()))?;

    let network = queries::network_stats(client).await?;
    info!(
        routes = network.total_routes,
        stops = network.total_stops,
        trips = network.total_trips,
        hub_stops = network.hub_stops,
        "Network statistics"
    );

    let routes = rank_routes(queries::route_frequency(client).await?, TOP_ROUTES);
    write_table(&output_dir.join("route_frequency.csv"), &routes)?;

    let connectivity = queries::stop_connectivity_distribution(client).await?;
    write_table(&output_dir.join("stop_connectivity.csv"), &connectivity)?;

    let by_stop = queries::stop_connectivity_by_stop(client).await?;
    write_table(&output_dir.join("stop_connectivity_by_stop.csv"), &by_stop)?;

    let hourly = queries::hourly_departures(client).await?;
    let peak = peak_hour(&hourly);
    write_table(&output_dir.join("hourly_departures.csv"), &hourly)?;
    info!(peak_hour = ?peak, "Hourly departures");

    let day_types = day_type_shares(&queries::trips_per_service(client).await?);
    write_table(&output_dir.join("service_by_day_type.csv"), &day_types)?;

    let peak_routes = rank_peak_routes(queries::peak_service(client).await?, TOP_PEAK_ROUTES);
    write_table(&output_dir.join("peak_service.csv"), &peak_routes)?;

    let isolated = isolated_stops(
        &queries::stop_locations(client).await?,
        ISOLATION_THRESHOLD_METERS,
    );
    write_table(&output_dir.join("isolated_stops.csv"), &isolated)?;
    info!(isolated = isolated.len(), "Isolated stops");

    let summary = ReportSummary {
        network,
        peak_hour: peak,
        service_by_day_type: day_types,
        isolated_stop_count: isolated.len(),
    };
    fs::write(
        output_dir.join("summary.json"),
        serde_json::to_string_pretty(&summary)?,
    )?;

    Ok(summary)
}
