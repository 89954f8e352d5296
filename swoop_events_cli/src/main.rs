use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum, ValueHint};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::Value as JsonValue;
use swoop_events::trajectory::TIMESTAMP;
use swoop_events::{
    angle_consistency, detect_extrema, set_start_point, AxisSettingsBuilder, DetectParams,
    Detection, DistanceUnit, FlightConfig, SpeedUnit, ThresholdConfig, Trajectory,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Rotation angles from the metre and foot columns may disagree by this much
/// before a warning is logged.
const ANGLE_TOLERANCE_RAD: f64 = 1e-3;

#[derive(Parser, Debug)]
#[command(author, version, about = "Swoop landing key-event CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Emit the x/y axis settings of a trajectory as JSON
    Axes(AxesArgs),
    /// Detect peaks and lows in one metric of one or more trajectories
    Detect(DetectArgs),
    /// Re-base time and distance columns on a start sample
    Rebase(RebaseArgs),
    /// Validate threshold and flight configuration files
    CheckConfig(CheckConfigArgs),
}

#[derive(Args, Debug)]
struct UnitArgs {
    /// Flight configuration JSON (units and pattern elevations)
    #[arg(long, value_hint = ValueHint::FilePath)]
    flight: Option<PathBuf>,

    /// Distance unit, overrides the flight configuration
    #[arg(long, value_enum)]
    distance: Option<DistanceOpt>,

    /// Speed unit, overrides the flight configuration
    #[arg(long, value_enum)]
    speed: Option<SpeedOpt>,
}

#[derive(Parser, Debug)]
struct AxesArgs {
    /// Trajectory CSV
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    #[command(flatten)]
    units: UnitArgs,

    /// Register derivatives, as COLUMN:ORDER (repeatable)
    #[arg(long = "derivative")]
    derivatives: Vec<String>,

    /// Only emit this x-axis metric
    #[arg(long)]
    x: Option<String>,

    /// Only emit this y-axis metric
    #[arg(long)]
    y: Option<String>,

    /// First sample to include
    #[arg(long)]
    start: Option<usize>,

    /// One past the last sample to include
    #[arg(long)]
    stop: Option<usize>,

    /// Output JSON path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct DetectArgs {
    /// Trajectory CSV files
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Threshold configuration JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    thresholds: PathBuf,

    /// Threshold category
    #[arg(long, default_value = "landing")]
    category: String,

    /// Threshold key within the category
    #[arg(long)]
    key: String,

    /// Sub-threshold for grouped entries (e.g. vert, horz)
    #[arg(long)]
    sub: Option<String>,

    /// Y-axis metric, or the column to differentiate with --derivative-order
    #[arg(long, default_value = "Elevation")]
    metric: String,

    /// Detect on this derivative order of --metric
    #[arg(long, default_value_t = 0)]
    derivative_order: usize,

    /// Fail when no peak is found
    #[arg(long, action = ArgAction::SetTrue)]
    require_peaks: bool,

    /// Fail when no low is found
    #[arg(long, action = ArgAction::SetTrue)]
    require_lows: bool,

    #[command(flatten)]
    units: UnitArgs,

    /// Output JSON path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct RebaseArgs {
    /// Trajectory CSV
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Sample that becomes the origin
    #[arg(long)]
    start: usize,

    /// Rotate so the landing ends on the positive x-axis
    #[arg(long, action = ArgAction::SetTrue)]
    rotate: bool,

    /// Output CSV path (`-` for stdout)
    #[arg(short, long, default_value = "-", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct CheckConfigArgs {
    /// Threshold configuration JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    thresholds: PathBuf,

    /// Flight configuration JSON
    #[arg(long, value_hint = ValueHint::FilePath)]
    flight: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DistanceOpt {
    M,
    Ft,
}

impl From<DistanceOpt> for DistanceUnit {
    fn from(value: DistanceOpt) -> Self {
        match value {
            DistanceOpt::M => DistanceUnit::M,
            DistanceOpt::Ft => DistanceUnit::Ft,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SpeedOpt {
    #[value(name = "km/u")]
    KmPerHour,
    Mph,
}

impl From<SpeedOpt> for SpeedUnit {
    fn from(value: SpeedOpt) -> Self {
        match value {
            SpeedOpt::KmPerHour => SpeedUnit::KmPerHour,
            SpeedOpt::Mph => SpeedUnit::Mph,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Axes(args) => args.verbose,
        Command::Detect(args) => args.verbose,
        Command::Rebase(args) => args.verbose,
        Command::CheckConfig(args) => args.verbose,
    };
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match cli.command {
        Command::Axes(args) => handle_axes(args),
        Command::Detect(args) => handle_detect(args),
        Command::Rebase(args) => handle_rebase(args),
        Command::CheckConfig(args) => handle_check_config(args),
    }
}

fn handle_axes(args: AxesArgs) -> Result<()> {
    let builder = axis_builder(&args.units)?;
    let mut trajectory = read_trajectory(&args.input)?;
    for spec in &args.derivatives {
        let (column, order) = parse_derivative_spec(spec)?;
        trajectory = trajectory
            .with_derivatives(&column, order)
            .with_context(|| format!("failed to differentiate {column}"))?;
    }

    let range = sample_range(args.start, args.stop, trajectory.len());
    let (x_axis, y_axis) = builder.axis_settings(
        &trajectory,
        args.x.as_deref(),
        args.y.as_deref(),
        range,
    )?;
    info!(
        "Axis settings: {} x metrics, {} y metrics",
        x_axis.len(),
        y_axis.len()
    );

    #[derive(Serialize)]
    struct AxesOutput<'a> {
        x_axis: &'a swoop_events::AxisSettings,
        y_axis: &'a swoop_events::AxisSettings,
    }
    write_json(
        &AxesOutput {
            x_axis: &x_axis,
            y_axis: &y_axis,
        },
        &args.output,
    )
}

fn handle_detect(args: DetectArgs) -> Result<()> {
    let builder = axis_builder(&args.units)?;
    let thresholds = load_thresholds(&args.thresholds)?;

    let params = DetectParams {
        category: args.category.clone(),
        key: args.key.clone(),
        sub: args.sub.clone(),
        metric: args.metric.clone(),
        derivative_order: args.derivative_order,
        require_peaks: args.require_peaks,
        require_lows: args.require_lows,
    };

    #[derive(Serialize)]
    struct FileDetection {
        input: String,
        #[serde(flatten)]
        detection: Detection,
    }

    let t_detect = Instant::now();
    let results = args
        .inputs
        .par_iter()
        .map(|path| -> Result<FileDetection> {
            let trajectory = read_trajectory(path)?;
            let detection = detect_extrema(&trajectory, &thresholds, &builder, &params)
                .with_context(|| format!("detection failed for {}", path.display()))?;
            Ok(FileDetection {
                input: path.display().to_string(),
                detection,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    for result in &results {
        info!(
            "{}: {} peaks, {} lows in {}",
            result.input,
            result.detection.extrema.peaks.len(),
            result.detection.extrema.lows.len(),
            result.detection.metric
        );
    }
    debug!(
        "Detect stage: {:.1} ms ({} files)",
        t_detect.elapsed().as_secs_f64() * 1000.0,
        results.len()
    );
    write_json(&results, &args.output)
}

fn handle_rebase(args: RebaseArgs) -> Result<()> {
    let trajectory = read_trajectory(&args.input)?;
    let rebased = set_start_point(&trajectory, args.start, args.rotate)
        .with_context(|| format!("failed to re-base {}", args.input.display()))?;

    if args.rotate {
        match angle_consistency(&trajectory, args.start) {
            Ok(diff) if diff > ANGLE_TOLERANCE_RAD => warn!(
                "Rotation angles differ between m and ft columns by {:.4} rad",
                diff
            ),
            Ok(diff) => debug!("Rotation angle difference {:.2e} rad", diff),
            Err(err) => warn!("Could not compare rotation angles: {err}"),
        }
    }

    if is_stdout(&args.output) {
        let stdout = io::stdout();
        let mut writer = csv::Writer::from_writer(stdout.lock());
        write_trajectory_rows(&rebased, &mut writer)?;
    } else {
        let file = File::create(&args.output)
            .with_context(|| format!("failed to create {}", args.output.display()))?;
        let mut writer = csv::Writer::from_writer(file);
        write_trajectory_rows(&rebased, &mut writer)?;
        info!("Re-based trajectory written: {}", args.output.display());
    }
    Ok(())
}

fn handle_check_config(args: CheckConfigArgs) -> Result<()> {
    let thresholds = load_thresholds(&args.thresholds)?;
    for category in thresholds.categories() {
        let keys: Vec<&str> = thresholds.keys(category)?.collect();
        info!("{}: {}", category, keys.join(", "));
    }
    if let Some(path) = args.flight.as_ref() {
        let flight = load_flight(path)?;
        info!(
            "Flight config ok: downwind {:?} ft, base {:?} ft, units {}/{}",
            flight.pattern_elevations().downwind,
            flight.pattern_elevations().base,
            flight.distance_unit(),
            flight.speed_unit()
        );
    }
    println!("{}", thresholds.fingerprint()?);
    Ok(())
}

fn axis_builder(units: &UnitArgs) -> Result<AxisSettingsBuilder> {
    let flight = match units.flight.as_ref() {
        Some(path) => load_flight(path)?,
        None => FlightConfig::default(),
    };
    let distance = units
        .distance
        .map(DistanceUnit::from)
        .unwrap_or_else(|| flight.distance_unit());
    let speed = units
        .speed
        .map(SpeedUnit::from)
        .unwrap_or_else(|| flight.speed_unit());
    Ok(AxisSettingsBuilder::new(distance, speed))
}

fn load_thresholds(path: &Path) -> Result<ThresholdConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read thresholds {}", path.display()))?;
    let json: JsonValue = serde_json::from_str(&text)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let config = ThresholdConfig::from_value(&json)
        .with_context(|| format!("invalid thresholds in {}", path.display()))?;
    Ok(config)
}

fn load_flight(path: &Path) -> Result<FlightConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read flight config {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("invalid flight config in {}", path.display()))
}

fn read_trajectory(path: &Path) -> Result<Trajectory> {
    let file = File::open(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_trajectory(file).with_context(|| format!("failed to parse {}", path.display()))
}

fn parse_trajectory<R: Read>(reader: R) -> Result<Trajectory> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    if headers.is_empty() {
        return Err(anyhow!("CSV has no header row"));
    }
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    let mut blanks = 0usize;

    for (row, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("malformed CSV row {}", row + 1))?;
        for (idx, name) in headers.iter().enumerate() {
            let cell = record.get(idx).unwrap_or("").trim();
            if cell.is_empty() {
                blanks += 1;
                columns[idx].push(f64::NAN);
                continue;
            }
            let parsed = if name == TIMESTAMP {
                parse_timestamp(cell)
            } else {
                cell.parse::<f64>().ok()
            };
            let value = parsed.ok_or_else(|| {
                anyhow!("invalid value '{}' in column {} row {}", cell, name, row + 1)
            })?;
            columns[idx].push(value);
        }
    }
    if blanks > 0 {
        warn!("{} blank cells read as NaN", blanks);
    }

    let trajectory = Trajectory::from_columns(headers.into_iter().zip(columns))?;
    debug!(
        "Loaded trajectory: {} samples, {} columns",
        trajectory.len(),
        trajectory.column_names().count()
    );
    Ok(trajectory)
}

/// Epoch seconds, from either a number or an RFC 3339 string.
fn parse_timestamp(cell: &str) -> Option<f64> {
    if let Ok(value) = cell.parse::<f64>() {
        return Some(value);
    }
    DateTime::parse_from_rfc3339(cell)
        .ok()
        .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
}

fn parse_derivative_spec(spec: &str) -> Result<(String, usize)> {
    let (column, order) = match spec.rsplit_once(':') {
        Some((column, order)) => {
            let order: usize = order
                .trim()
                .parse()
                .with_context(|| format!("invalid derivative order in '{}'", spec))?;
            (column.trim(), order)
        }
        None => (spec.trim(), 1),
    };
    if column.is_empty() {
        return Err(anyhow!("derivative spec '{}' has no column", spec));
    }
    if order == 0 {
        return Err(anyhow!("derivative order must be > 0"));
    }
    Ok((column.to_string(), order))
}

fn sample_range(start: Option<usize>, stop: Option<usize>, len: usize) -> Option<Range<usize>> {
    if start.is_none() && stop.is_none() {
        return None;
    }
    Some(start.unwrap_or(0)..stop.unwrap_or(len))
}

fn is_stdout(path: &Path) -> bool {
    path.as_os_str() == "-"
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if is_stdout(path) {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        serde_json::to_writer_pretty(&mut handle, value)?;
        writeln!(handle)?;
    } else {
        let file =
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, value)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("JSON written: {}", path.display());
    }
    Ok(())
}

fn write_trajectory_rows<W: Write>(
    trajectory: &Trajectory,
    writer: &mut csv::Writer<W>,
) -> Result<()> {
    let columns: Vec<_> = trajectory.columns().collect();
    writer.write_record(columns.iter().map(|(name, _)| *name))?;
    for row in 0..trajectory.len() {
        writer.write_record(columns.iter().map(|(_, values)| format_cell(values[row])))?;
    }
    writer.flush()?;
    Ok(())
}

fn format_cell(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numeric_and_rfc3339_timestamps() {
        let text = "timestamp,elevation\n\
                    2023-05-01T10:00:00Z,120.5\n\
                    2023-05-01T10:00:00.200Z,118.0\n";
        let traj = parse_trajectory(text.as_bytes()).unwrap();
        let ts = traj.column("timestamp").unwrap();
        // epoch seconds near 1.7e9 resolve to about 2.4e-7 s
        assert!((ts[1] - ts[0] - 0.2).abs() < 1e-6);
        assert_eq!(traj.column("elevation").unwrap()[1], 118.0);

        assert_eq!(parse_timestamp("1682935200.5"), Some(1682935200.5));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn blank_cells_become_nan_and_bad_cells_fail() {
        let traj = parse_trajectory("a,b\n1,\n2,3\n".as_bytes()).unwrap();
        assert!(traj.column("b").unwrap()[0].is_nan());
        let err = parse_trajectory("a\nfast\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("invalid value 'fast'"));
    }

    #[test]
    fn derivative_specs() {
        assert_eq!(
            parse_derivative_spec("elevation:2").unwrap(),
            ("elevation".to_string(), 2)
        );
        assert_eq!(
            parse_derivative_spec("horz_speed_km/u").unwrap(),
            ("horz_speed_km/u".to_string(), 1)
        );
        assert!(parse_derivative_spec("elevation:0").is_err());
        assert!(parse_derivative_spec(":3").is_err());
    }

    #[test]
    fn optional_sample_range() {
        assert_eq!(sample_range(None, None, 10), None);
        assert_eq!(sample_range(Some(4), None, 10), Some(4..10));
        assert_eq!(sample_range(None, Some(3), 10), Some(0..3));
    }

    #[test]
    fn rebased_rows_round_trip_through_csv() {
        let traj = parse_trajectory("time_sec,elevation\n1.5,10\n2.0,8\n".as_bytes()).unwrap();
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_trajectory_rows(&traj, &mut writer).unwrap();
        let bytes = writer.into_inner().unwrap();
        let back = parse_trajectory(bytes.as_slice()).unwrap();
        assert_eq!(back, traj);
    }

    #[test]
    fn cli_parses_detect_flags() {
        let cli = Cli::try_parse_from([
            "swoop",
            "detect",
            "a.csv",
            "b.csv",
            "--thresholds",
            "t.json",
            "--key",
            "init_turn",
            "--speed",
            "mph",
            "--require-peaks",
        ])
        .unwrap();
        match cli.command {
            Command::Detect(args) => {
                assert_eq!(args.inputs.len(), 2);
                assert_eq!(args.category, "landing");
                assert!(args.require_peaks && !args.require_lows);
                assert!(matches!(args.units.speed, Some(SpeedOpt::Mph)));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
