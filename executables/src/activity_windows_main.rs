#![cfg_attr(feature = "strict", deny(warnings))]
#![cfg_attr(feature = "strict", deny(clippy::all))]
use common::{
    logging,
    util::{create_parent_dirs, path_or_relative_to_project_root, write_serializable_to_json},
    AwResult,
};
use executables::{read_table, reference_date, run, ActivityWindowsConfig};
use std::fs::File;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
struct Cli {
    #[structopt(
        short = "i",
        long = "input",
        parse(from_os_str),
        help = "Activity records, either a .json array of records or a .csv file with header."
    )]
    input_path: PathBuf,
    #[structopt(long = "config", parse(from_os_str))]
    config_path: Option<PathBuf>,
    #[structopt(
        long,
        help = "Date the windows are relative to. Enter in YYYY-MM-DD format. Defaults to today."
    )]
    date: Option<String>,
    #[structopt(short = "o", long = "output", parse(from_os_str))]
    output_path: Option<PathBuf>,
    #[structopt(short = "s", long = "summary", parse(from_os_str))]
    summary_path: Option<PathBuf>,
}

impl Cli {
    fn output_path(&self) -> AwResult<PathBuf> {
        path_or_relative_to_project_root(
            self.output_path.as_ref(),
            "data/activity_windows/matched.csv",
        )
    }

    fn summary_path(&self) -> AwResult<PathBuf> {
        path_or_relative_to_project_root(
            self.summary_path.as_ref(),
            "data/activity_windows/summary.json",
        )
    }
}

fn main() -> AwResult<()> {
    logging::init_logging()?;

    let result = activity_windows(Cli::from_args());
    if let Err(error) = &result {
        log::error!("{}", error);
    }
    result
}

fn activity_windows(args: Cli) -> AwResult<()> {
    log::info!("{:?}", args);
    let config = match &args.config_path {
        Some(path) => ActivityWindowsConfig::from_file(path)?,
        None => ActivityWindowsConfig::default(),
    };
    log::info!("{:?}", config);
    let reference_date = reference_date(args.date.as_deref())?;

    log::info!("Reading activities from {}...", args.input_path.display());
    let activities = read_table(&args.input_path)?;
    log::info!("Read {} activities", activities.len());

    let report = run(&config, activities, reference_date)?;
    for (start, end) in report.ranges.iter() {
        log::debug!("Window {} to {}", start, end);
    }

    if let (Some(latest), median) = (report.summary.latest(), &report.median) {
        for metric in report.summary.metrics.iter() {
            log::info!(
                "{}: {} = {:.1}, {} = {:.1}",
                metric,
                latest.label,
                latest.value(metric).unwrap_or(f64::NAN),
                median.label,
                median.value(metric).unwrap_or(f64::NAN)
            );
        }
    } else {
        log::warn!("No activity fell into any window");
    }

    let output_path = args.output_path()?;
    create_parent_dirs(&output_path)?;
    report.matched.table.write_csv(File::create(&output_path)?)?;
    log::info!("Wrote matched activities to {}", output_path.display());

    let summary_path = args.summary_path()?;
    write_serializable_to_json(&report.summary_output(), &summary_path)?;
    log::info!("Wrote summary to {}", summary_path.display());

    Ok(())
}
