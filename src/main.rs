mod args;
mod geocode;

use clap::Parser;
use log::{debug, warn};
use snafu::ErrorCompat;
use std::error::Error;

use crate::args::{Args, Command};
use crate::geocode::batch::BatchOptions;
use crate::geocode::config_reader::{read_config, GeocodeConfig};
use crate::geocode::nominatim::NominatimClient;
use crate::geocode::GeoResult;

fn load_config(args: &Args) -> GeoResult<GeocodeConfig> {
    let mut config = match &args.config {
        Some(p) => read_config(p)?,
        None => GeocodeConfig::default(),
    };
    if let Some(ua) = &args.user_agent {
        config.geocoder.user_agent = Some(ua.clone());
    }
    if let Some(endpoint) = &args.endpoint {
        config.geocoder.endpoint = Some(endpoint.clone());
    }
    if let Some(rps) = args.requests_per_second {
        config.geocoder.requests_per_second = Some(rps);
    }
    config.validate()?;
    debug!("config: {:?}", config);
    Ok(config)
}

fn run(args: &Args) -> GeoResult<()> {
    let config = load_config(args)?;
    match &args.command {
        Command::Geocode {
            input,
            output,
            start,
            end,
            fresh,
        } => {
            let client = NominatimClient::new(&config.geocoder)?;
            let options = BatchOptions {
                input: input.clone(),
                output_dir: output.clone(),
                start: *start,
                end: *end,
                fresh: *fresh,
            };
            geocode::run_geocode(&config, &client, &options)
        }
        Command::Reprocess { input, output } => {
            let client = NominatimClient::new(&config.geocoder)?;
            geocode::run_reprocess(&config, &client, input, output)
        }
        Command::Merge { input, output } => geocode::run_merge(input, output),
        Command::Report { input, output } => geocode::run_report(input, output.as_deref()),
    }
}

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = run(&args) {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured: {}", e);
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        std::process::exit(1);
    }
}
