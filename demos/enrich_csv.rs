use egms::{Egms, EgmsError};
use std::env;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<(), EgmsError> {
    env_logger::init();

    let input = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("Point_downloads/EGMS_L3_E30N33_100km_U_2019_2023_1.csv"));

    let egms = Egms::from_config_file(None)?;
    let report = egms.enrich().input(&input).call().await?;

    println!("Location dataset saved as: {}", report.output.display());
    println!(
        "{} rows: {} named, {} unknown, {} geocoding errors",
        report.rows, report.resolved, report.unknown, report.geocoding_errors
    );

    Ok(())
}
