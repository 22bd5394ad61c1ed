use egms::{DisplacementChoice, Egms, EgmsConfig, EgmsError, SweepSpec, YearRange};
use std::env;

#[tokio::main]
async fn main() -> Result<(), EgmsError> {
    env_logger::init();

    let config = EgmsConfig {
        access_token: env::var("EGMS_TOKEN").ok(),
        year_range: YearRange::Y2019_2023,
        ..EgmsConfig::default()
    };
    let egms = Egms::new(config);

    // Both displacement components of one cell over Bologna.
    let summary = egms
        .download()
        .sweep(SweepSpec::SingleL3 {
            east: 44,
            north: 23,
            displacement: DisplacementChoice::Both,
        })
        .call()
        .await?;

    println!(
        "{} of {} files saved ({:.0}%) in {}s",
        summary.succeeded,
        summary.attempted,
        summary.success_rate(),
        summary.elapsed().num_seconds()
    );
    for path in summary.saved_paths() {
        println!("  {}", path.display());
    }

    Ok(())
}
