use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Geocodes lists of polling stations, trying simpler forms of each address
/// until the geocoding service finds it.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    pub command: Command,

    /// (file path, optional) A JSON configuration file. All the keys are optional. See the
    /// documentation of the station_geocoding crate for the format.
    #[clap(short, long, value_parser, global = true)]
    pub config: Option<PathBuf>,

    /// Overrides the User-Agent sent to the geocoding service. Public Nominatim instances
    /// require one that identifies your application.
    #[clap(long, value_parser, global = true)]
    pub user_agent: Option<String>,

    /// Overrides the URL of the search endpoint.
    #[clap(long, value_parser, global = true)]
    pub endpoint: Option<String>,

    /// Overrides the request rate. 0 disables the rate limiting.
    #[clap(long, value_parser, global = true)]
    pub requests_per_second: Option<f64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Geocodes a station list (xlsx or csv) into a directory of JSON files.
    Geocode {
        /// (file path) The station list.
        #[clap(short, long, value_parser)]
        input: PathBuf,
        /// (directory) Where stations.json, geocoding_stats.json and the checkpoint go.
        #[clap(short, long, value_parser)]
        output: PathBuf,
        /// (1-based, inclusive) First station to geocode.
        #[clap(long, value_parser)]
        start: Option<usize>,
        /// (1-based, inclusive) Last station to geocode.
        #[clap(long, value_parser)]
        end: Option<usize>,
        /// Ignores and deletes the checkpoint of a previous run.
        #[clap(long, takes_value = false)]
        fresh: bool,
    },
    /// Geocodes again the stations of a result file that have no geocoded address.
    Reprocess {
        #[clap(short, long, value_parser)]
        input: PathBuf,
        #[clap(short, long, value_parser)]
        output: PathBuf,
    },
    /// Merges result files. For the same station id, the last file wins.
    Merge {
        #[clap(short, long, value_parser, required = true)]
        input: Vec<PathBuf>,
        #[clap(short, long, value_parser)]
        output: PathBuf,
    },
    /// Prints the success rates of a result file.
    Report {
        #[clap(short, long, value_parser)]
        input: PathBuf,
        /// (file path, optional) Also writes the statistics in JSON format.
        #[clap(short, long, value_parser)]
        output: Option<PathBuf>,
    },
}
