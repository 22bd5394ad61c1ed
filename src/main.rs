use clap::{Parser, Subcommand};
use egms::{
    DisplacementChoice, DownloadError, DownloadEvent, DownloadSummary, Egms, EgmsConfig,
    EgmsError, L2Level, Polarization, Swath, SweepHandle, SweepSpec, WaitReason, YearRange,
};
use env_logger::Env;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Download EGMS ground-motion tiles and add place names to point CSVs"
)]
struct Cli {
    /// JSON config file (defaults to <config dir>/egms/config.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory for extracted tile CSVs
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    /// Directory for enriched CSVs
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Archive access token
    #[arg(long, env = "EGMS_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Archive release, e.g. 2019_2023
    #[arg(long, global = true)]
    year_range: Option<YearRange>,

    /// Seconds to wait between files
    #[arg(long, global = true)]
    delay: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download one L2a/L2b burst file
    L2 {
        #[arg(long, default_value = "l2a")]
        level: L2Level,
        /// Relative orbit, 0-999
        #[arg(long)]
        orbit: u16,
        /// Burst cycle, 0-9999
        #[arg(long)]
        burst_cycle: u16,
        #[arg(long, default_value = "IW1")]
        swath: Swath,
        #[arg(long, default_value = "VV")]
        polarization: Polarization,
    },

    /// Download every L2a/L2b file in an orbit and burst cycle range
    L2Batch {
        #[arg(long, default_value = "l2a")]
        level: L2Level,
        #[arg(long)]
        orbit_min: u16,
        #[arg(long)]
        orbit_max: u16,
        #[arg(long)]
        burst_min: u16,
        #[arg(long)]
        burst_max: u16,
        #[arg(long, value_delimiter = ',', default_value = "IW1,IW2,IW3")]
        swaths: Vec<Swath>,
        #[arg(long, value_delimiter = ',', default_value = "VV")]
        polarizations: Vec<Polarization>,
        /// Also pack the downloaded CSVs into one zip
        #[arg(long)]
        bundle: bool,
    },

    /// Download one L3 100 km cell
    L3 {
        #[arg(long)]
        east: u16,
        #[arg(long)]
        north: u16,
        /// E, U or Both
        #[arg(long, default_value = "E")]
        displacement: DisplacementChoice,
    },

    /// Download every L3 cell in an east/north range
    L3Batch {
        #[arg(long)]
        east_min: u16,
        #[arg(long)]
        east_max: u16,
        #[arg(long)]
        north_min: u16,
        #[arg(long)]
        north_max: u16,
        /// E, U or Both
        #[arg(long, default_value = "E")]
        displacement: DisplacementChoice,
        /// Also pack the downloaded CSVs into one zip
        #[arg(long)]
        bundle: bool,
    },

    /// Add a location column to downloaded point CSVs
    Enrich {
        /// CSV files to enrich
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        inputs: Vec<PathBuf>,
        /// Enrich every EGMS_*.csv in the download directory
        #[arg(long)]
        all: bool,
    },
}

impl Command {
    fn bundle(&self) -> bool {
        matches!(
            self,
            Command::L2Batch { bundle: true, .. } | Command::L3Batch { bundle: true, .. }
        )
    }

    fn into_sweep(self) -> Option<SweepSpec> {
        let sweep = match self {
            Command::L2 {
                level,
                orbit,
                burst_cycle,
                swath,
                polarization,
            } => SweepSpec::SingleL2 {
                level,
                relative_orbit: orbit,
                burst_cycle,
                swath,
                polarization,
            },
            Command::L2Batch {
                level,
                orbit_min,
                orbit_max,
                burst_min,
                burst_max,
                swaths,
                polarizations,
                ..
            } => SweepSpec::BatchL2 {
                level,
                relative_orbits: orbit_min..=orbit_max,
                burst_cycles: burst_min..=burst_max,
                swaths,
                polarizations,
            },
            Command::L3 {
                east,
                north,
                displacement,
            } => SweepSpec::SingleL3 {
                east,
                north,
                displacement,
            },
            Command::L3Batch {
                east_min,
                east_max,
                north_min,
                north_max,
                displacement,
                ..
            } => SweepSpec::BatchL3 {
                east: east_min..=east_max,
                north: north_min..=north_max,
                displacement,
            },
            Command::Enrich { .. } => return None,
        };
        Some(sweep)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", describe_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, EgmsError> {
    let config = load_config(&cli)?;
    let egms = Egms::new(config);

    match cli.command {
        Command::Enrich { inputs, all } => {
            let inputs = if all {
                let found = egms.downloaded_csvs()?;
                info!(
                    "Found {} tile CSV(s) in {}",
                    found.len(),
                    egms.config().download_dir.display()
                );
                found
            } else {
                inputs
            };
            Ok(enrich_all(&egms, &inputs).await)
        }
        command => {
            let bundle = command.bundle();
            // Only `Enrich` has no sweep.
            let Some(sweep) = command.into_sweep() else {
                return Ok(ExitCode::SUCCESS);
            };
            let summary = download(&egms, sweep.clone()).await?;
            print_summary(&summary);
            if bundle {
                if let Some(path) = egms.bundle(&sweep, &summary).await? {
                    println!("Bundle: {}", path.display());
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(cli: &Cli) -> Result<EgmsConfig, EgmsError> {
    let mut config = EgmsConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.download_dir {
        config.download_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(token) = &cli.token {
        config.access_token = Some(token.clone());
    }
    if let Some(year_range) = cli.year_range {
        config.year_range = year_range;
    }
    if let Some(delay) = cli.delay {
        config.delay_seconds = delay;
    }
    Ok(config)
}

async fn download(egms: &Egms, sweep: SweepSpec) -> Result<DownloadSummary, EgmsError> {
    let SweepHandle {
        mut events,
        cancel,
        join,
    } = egms.spawn_download(sweep)?;

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current file");
            interrupt.cancel();
        }
    });

    while let Some(event) = events.recv().await {
        report_progress(&event);
    }
    Ok(join.await.map_err(DownloadError::TaskJoin)??)
}

fn report_progress(event: &DownloadEvent) {
    match event {
        DownloadEvent::TileFinished { index, total, .. } => {
            if let Some(percent) = event.progress_percent() {
                info!("Progress: {}/{} ({:.0}%)", index, total, percent);
            }
        }
        DownloadEvent::Waiting {
            duration,
            reason: WaitReason::FailureCooldown,
        } => info!("Waiting {}s before continuing", duration.as_secs_f64()),
        _ => {}
    }
}

fn print_summary(summary: &DownloadSummary) {
    println!("=== Download Summary ===");
    println!("Total files attempted: {}", summary.attempted);
    println!("Successful downloads: {}", summary.succeeded);
    println!("Failed downloads: {}", summary.failed);
    println!("Success rate: {:.1}%", summary.success_rate());
    if summary.cancelled {
        println!(
            "Stopped early: {} of {} files not attempted",
            summary.planned - summary.attempted,
            summary.planned
        );
    }
    for result in &summary.results {
        if !result.outcome.is_success() {
            println!("  {}: {}", result.tile.label(), result.outcome);
        }
    }
}

/// Enriches each file in turn; a failing file does not stop the others.
async fn enrich_all(egms: &Egms, inputs: &[PathBuf]) -> ExitCode {
    if inputs.is_empty() {
        warn!("No CSV files to enrich");
    }
    let mut failures = 0;
    for input in inputs {
        info!("Adding location names to {}", input.display());
        match egms.enrich().input(input).call().await {
            Ok(report) => println!(
                "{}: {} rows ({} resolved, {} unknown, {} geocoding errors) -> {}",
                input.display(),
                report.rows,
                report.resolved,
                report.unknown,
                report.geocoding_errors,
                report.output.display()
            ),
            Err(e) => {
                error!("{}", describe_error(&e));
                failures += 1;
            }
        }
    }
    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn describe_error(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
