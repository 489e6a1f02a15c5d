mod inspect;
mod serve;

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use console::style;
use std::path::PathBuf;

use crate::core::terminal::{self, GuideSection};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Service")
        .command("run", "Start the scheduler, workers and HTTP API")
        .print();

    GuideSection::new("Inspect")
        .command("sun --lat X --lon Y", "Show sun state and the next transition")
        .command("cameras", "List cameras with their pending jobs")
        .print();

    GuideSection::new("Options")
        .command("--config <path>", "Config file (default <data_dir>/camsync.toml)")
        .command("--api-host <host>", "Override [server] host")
        .command("--api-port <port>", "Override [server] port")
        .command("--at <rfc3339>", "Instant for `sun` (default now)")
        .command("--verbose", "Debug logging")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("camsync").green()
    );
}

#[derive(Debug, Clone, PartialEq, Default)]
pub(crate) struct RunArgs {
    pub config: Option<PathBuf>,
    pub api_host: Option<String>,
    pub api_port: Option<u16>,
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SunArgs {
    pub latitude: f64,
    pub longitude: f64,
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    Run(RunArgs),
    Sun(SunArgs),
    Cameras { config: Option<PathBuf> },
    Help,
}

fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str> {
    match args.get(i + 1) {
        Some(value) => Ok(value.as_str()),
        None => bail!("{} needs a value", flag),
    }
}

pub(crate) fn parse_run_args(args: &[String], start: usize) -> Result<RunArgs> {
    let mut run = RunArgs::default();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                run.config = Some(PathBuf::from(flag_value(args, i, "--config")?));
                i += 2;
            }
            "--api-host" => {
                run.api_host = Some(flag_value(args, i, "--api-host")?.to_string());
                i += 2;
            }
            "--api-port" => {
                let raw = flag_value(args, i, "--api-port")?;
                match raw.parse() {
                    Ok(port) => run.api_port = Some(port),
                    Err(_) => bail!("invalid --api-port '{}'", raw),
                }
                i += 2;
            }
            "--verbose" | "-v" => {
                run.verbose = true;
                i += 1;
            }
            other => bail!("unknown option '{}'", other),
        }
    }
    Ok(run)
}

pub(crate) fn parse_sun_args(args: &[String], start: usize) -> Result<SunArgs> {
    let mut latitude = None;
    let mut longitude = None;
    let mut at = None;
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--lat" => {
                let raw = flag_value(args, i, "--lat")?;
                latitude = Some(raw.parse::<f64>().map_err(|_| {
                    anyhow::anyhow!("invalid --lat '{}'", raw)
                })?);
                i += 2;
            }
            "--lon" => {
                let raw = flag_value(args, i, "--lon")?;
                longitude = Some(raw.parse::<f64>().map_err(|_| {
                    anyhow::anyhow!("invalid --lon '{}'", raw)
                })?);
                i += 2;
            }
            "--at" => {
                let raw = flag_value(args, i, "--at")?;
                at = Some(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc));
                i += 2;
            }
            other => bail!("unknown option '{}'", other),
        }
    }
    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        bail!("sun needs both --lat and --lon");
    };
    Ok(SunArgs {
        latitude,
        longitude,
        at,
    })
}

pub(crate) fn parse_command(args: &[String]) -> Result<Command> {
    match args.get(1).map(String::as_str) {
        None | Some("help") | Some("--help") | Some("-h") => Ok(Command::Help),
        Some("run") => Ok(Command::Run(parse_run_args(args, 2)?)),
        Some("sun") => Ok(Command::Sun(parse_sun_args(args, 2)?)),
        Some("cameras") => {
            let run = parse_run_args(args, 2)?;
            Ok(Command::Cameras { config: run.config })
        }
        Some(other) => bail!("unknown command '{}', see `camsync help`", other),
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    match parse_command(&args)? {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Run(run) => serve::run(run).await,
        Command::Sun(sun) => inspect::print_sun(&sun),
        Command::Cameras { config } => inspect::print_cameras(config.as_deref()).await,
    }
}
