use std::error::Error;
use std::str::FromStr;

use dotenv::dotenv;
use structopt::StructOpt;

use festival::config::get_variable;
use festival::contest::ContestFilter;
use festival::db::{Db, Filter, PgDb};
use festival::export::render_csv;
use festival::log::{info, initialize_logger};

#[derive(Debug)]
enum Format {
    Csv,
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown format {:?}", other)),
        }
    }
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "export-registrations",
    about = "Print stored registrations, optionally filtered"
)]
struct Opt {
    /// Only this contest, or ALL
    #[structopt(long)]
    contest: Option<ContestFilter>,

    /// Case-insensitive text to look for in names, emails and numbers
    #[structopt(long)]
    search: Option<String>,

    /// Output format
    #[structopt(long, default_value = "csv", possible_values = &["csv", "json"])]
    format: Format,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let opt = Opt::from_args();

    let logger = initialize_logger();

    let connection_string = get_variable("FESTIVAL_DB_CONNECTION_STRING");
    let pool = sqlx::Pool::connect(&connection_string)
        .await
        .expect("create database pool from FESTIVAL_DB_CONNECTION_STRING");
    let db = PgDb::new(pool);

    let contest = opt.contest.unwrap_or(ContestFilter::All).contest();
    let filter = Filter::new(contest, opt.search.as_deref());

    info!(logger, "Exporting registrations..."; "filter" => ?filter, "format" => ?opt.format);

    let registrations = db.query(&filter).await?;

    let output = match opt.format {
        Format::Csv => render_csv(&registrations),
        Format::Json => serde_json::to_string_pretty(&registrations)?,
    };

    println!("{}", output);

    info!(logger, "Exported {} registrations", registrations.len());

    Ok(())
}
