#![cfg_attr(feature = "strict", deny(warnings))]
#![cfg_attr(feature = "strict", deny(clippy::all))]
use common::{logging, AwResult};
use date_windows::{window_to_strings, NextWeeks, PreviousWeeks, WindowRequest};
use executables::reference_date;
use structopt::StructOpt;

#[derive(StructOpt, Debug)]
struct Cli {
    #[structopt(
        long,
        help = "Date the windows are relative to. Enter in YYYY-MM-DD format. Defaults to today."
    )]
    date: Option<String>,
    #[structopt(short = "w", long, default_value = "1", help = "Weeks per window.")]
    weeks: i64,
    #[structopt(
        short = "y",
        long,
        help = "Number of earlier years. Defaults to 0, or 1 with --next."
    )]
    years: Option<i64>,
    #[structopt(
        long,
        help = "Generate the weeks after the date in earlier years instead of the weeks up to it."
    )]
    next: bool,
}

impl Cli {
    fn request(&self) -> WindowRequest {
        if self.next {
            WindowRequest::Next(NextWeeks {
                weeks_forward: self.weeks,
                years_back: self.years.unwrap_or(1),
            })
        } else {
            WindowRequest::Previous(PreviousWeeks {
                weeks_back: self.weeks,
                years_back: self.years.unwrap_or(0),
            })
        }
    }
}

fn main() -> AwResult<()> {
    logging::init_logging()?;

    let args = Cli::from_args();
    log::info!("{:?}", args);
    let reference_date = reference_date(args.date.as_deref())?;

    let windows: Vec<(String, String)> = args
        .request()
        .windows(reference_date)?
        .into_iter()
        .map(window_to_strings)
        .collect();
    println!("{}", serde_json::to_string_pretty(&windows)?);

    Ok(())
}
