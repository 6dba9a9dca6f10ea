use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use pm25_exposure::{
    harmonize_files, largest_per_country, merge_onto_reference, read_field, read_points,
    reduce_daily, resample_mean, run, sample_points, write_field, write_geojson, write_table,
    AdminLevel, OutputFormat, Resampling, RunOutcome, RunPlan, StageTimer, TerritoryLayer,
    TimeBucket,
};

#[derive(Parser, Debug)]
#[command(
    name = "pm25-exposure",
    about = "Population-weighted PM2.5 exposure per administrative region"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute every run of a JSON run plan
    Run {
        /// Path to the run plan
        plan: PathBuf,
    },
    /// Align yearly grid files onto a reference grid and stack them in time
    Merge {
        /// Grid whose coordinates every input is aligned to
        #[arg(long)]
        reference: PathBuf,
        /// Merged grid file to write
        #[arg(short, long)]
        output: PathBuf,
        /// Reduce hourly steps to daily means after merging
        #[arg(long)]
        daily: bool,
        /// Resampling used for inputs that are not on the reference grid
        #[arg(long, value_parser = parse_resampling, default_value = "nearest")]
        method: Resampling,
        /// Further grid files
        inputs: Vec<PathBuf>,
    },
    /// Extract time series at the centroids of populous places
    Sample {
        /// Concentration grid file
        #[arg(long)]
        field: PathBuf,
        /// CSV with lau_id, lau_name, country, longitude, latitude, population
        #[arg(long)]
        points: PathBuf,
        /// CSV file to write
        #[arg(short, long)]
        output: PathBuf,
        /// Keep only the N most populous points per country
        #[arg(long)]
        per_country: Option<usize>,
        /// Average the field into D, W or Y buckets before sampling
        #[arg(long)]
        bucket: Option<TimeBucket>,
    },
    /// Merge NUTS boundaries with territory layers into one GeoJSON file
    Harmonize {
        /// NUTS GeoJSON with all levels
        #[arg(long)]
        base: PathBuf,
        /// GeoJSON file to write
        #[arg(short, long)]
        output: PathBuf,
        /// Territory layer as COUNTRY:LEVEL:PATH, e.g. UKR:3:ukraine-adm2.geojson
        #[arg(long = "extra", value_parser = parse_territory)]
        extras: Vec<TerritoryLayer>,
    },
}

fn parse_resampling(s: &str) -> Result<Resampling, String> {
    match s.to_ascii_lowercase().as_str() {
        "nearest" => Ok(Resampling::Nearest),
        "bilinear" => Ok(Resampling::Bilinear),
        "sum" => Ok(Resampling::Sum),
        other => Err(format!(
            "unknown method '{other}', expected nearest, bilinear or sum"
        )),
    }
}

fn parse_territory(s: &str) -> Result<TerritoryLayer, String> {
    let mut parts = s.splitn(3, ':');
    let (Some(country), Some(level), Some(path)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(format!("expected COUNTRY:LEVEL:PATH, got '{s}'"));
    };
    let level = level
        .parse::<u8>()
        .map_err(|e| format!("invalid level '{level}': {e}"))
        .and_then(|l| AdminLevel::new(l).map_err(|e| e.to_string()))?;
    Ok(TerritoryLayer::new(country, level, path))
}

fn run_plan(plan: PathBuf) -> Result<ExitCode> {
    let plan = RunPlan::from_file(&plan)?;
    let configs = plan.configs();
    let mut failed = 0;
    for config in &configs {
        match run(config) {
            Ok(RunOutcome::Written(path)) => info!("Finished {}", path.display()),
            Ok(RunOutcome::Skipped(_)) => {}
            Err(e) => {
                failed += 1;
                error!(
                    "Run {} failed: {:#}",
                    config.output_path().display(),
                    anyhow!(e)
                );
            }
        }
    }
    if failed > 0 {
        error!("{failed} of {} runs failed", configs.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn merge(
    reference: PathBuf,
    output: PathBuf,
    daily: bool,
    method: Resampling,
    inputs: Vec<PathBuf>,
) -> Result<()> {
    let _timer = StageTimer::start("Merging grids");
    let reference_field = read_field(&reference)?;
    let others = inputs
        .iter()
        .map(|path| read_field(path).with_context(|| format!("reading {}", path.display())))
        .collect::<Result<Vec<_>>>()?;
    let mut merged = merge_onto_reference(reference_field, others, method)?;
    if daily {
        merged = reduce_daily(&merged)?;
    }
    write_field(&merged, &output)?;
    Ok(())
}

fn sample(
    field: PathBuf,
    points: PathBuf,
    output: PathBuf,
    per_country: Option<usize>,
    bucket: Option<TimeBucket>,
) -> Result<()> {
    let mut field = read_field(&field)?;
    if let Some(bucket) = bucket {
        field = resample_mean(&field, bucket)?;
    }
    let mut points = read_points(&points)?;
    if let Some(n) = per_country {
        points = largest_per_country(points, n);
    }
    let mut table = sample_points(&field, &points)?;
    write_table(&mut table, &output, OutputFormat::Csv)?;
    Ok(())
}

fn harmonize(base: PathBuf, output: PathBuf, extras: Vec<TerritoryLayer>) -> Result<()> {
    let remapped = [AdminLevel::COUNTRY, AdminLevel::FINEST];
    if extras.iter().any(|layer| !remapped.contains(&layer.level)) {
        bail!("territory layers must be remapped to level 0 or 3");
    }
    let boundaries = harmonize_files(&base, &extras)?;
    write_geojson(&boundaries, &output)?;
    Ok(())
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { plan } => run_plan(plan),
        Command::Merge {
            reference,
            output,
            daily,
            method,
            inputs,
        } => merge(reference, output, daily, method, inputs).map(|_| ExitCode::SUCCESS),
        Command::Sample {
            field,
            points,
            output,
            per_country,
            bucket,
        } => sample(field, points, output, per_country, bucket).map(|_| ExitCode::SUCCESS),
        Command::Harmonize {
            base,
            output,
            extras,
        } => harmonize(base, output, extras).map(|_| ExitCode::SUCCESS),
    }
}
