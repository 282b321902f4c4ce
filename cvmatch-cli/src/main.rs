mod cli;
use cli::{arg, Cli};

#[macro_use]
extern crate log;

use clap::ArgMatches;
use env_logger::{Builder, Env, Target};
use itertools::Itertools;
use thiserror::Error;

use cvmatch::prelude::{
    Cggtts, CggttsOptions, Column, Constellation, MatchMode, MatchOptions, MatchingError,
    NamingConvention, ParsingError, Rinex, RinexOptions, Series,
};

use std::str::FromStr;

#[derive(Debug, Error)]
pub enum Error {
    #[error("parsing error: {0}")]
    Parsing(#[from] ParsingError),
    #[error("matching error: {0}")]
    Matching(#[from] MatchingError),
    #[error("invalid {0}: \"{1}\"")]
    InvalidArgument(&'static str, String),
}

fn parse_arg<T: FromStr>(matches: &ArgMatches, name: &'static str) -> Result<T, Error> {
    let value = arg(matches, name);
    T::from_str(value).map_err(|_| Error::InvalidArgument(name, value.to_string()))
}

fn print_series(label: &str, series: &Series) {
    println!("t,{}", label);
    for (t, value) in series.iter() {
        println!("{},{}", t, value);
    }
}

fn rinex(matches: &ArgMatches, identification: bool) -> Result<(), Error> {
    let opts = RinexOptions::default()
        .with_progress(matches.get_flag("progress"))
        .with_unsupported_systems_skipped(matches.get_flag("skip-unsupported"));
    let constellation = parse_arg::<Constellation>(matches, "constellation")?;
    let code = arg(matches, "code");

    let lhs = Rinex::from_file(arg(matches, "lhs"), &opts)?;
    let rhs = Rinex::from_file(arg(matches, "rhs"), &opts)?;

    if identification {
        for (name, data) in [("lhs", &lhs), ("rhs", &rhs)] {
            info!("{} RINEX V{}", name, data.header.version);
            info!("{} EPOCHS         {}", name, data.epochs().len());
            for constellation in data.constellations() {
                if let Some(observations) = data.observations(constellation) {
                    info!(
                        "{} {:<14} {}",
                        name,
                        constellation.to_string(),
                        observations.codes().iter().join(", ")
                    );
                }
            }
        }
        return Ok(());
    }

    let series = lhs.averaged_difference(&rhs, constellation, code)?;
    info!("{} common epochs", series.len());
    print_series(&format!("{}({})", code, constellation), &series);
    Ok(())
}

fn cggtts(matches: &ArgMatches, identification: bool) -> Result<(), Error> {
    let start = matches.get_one::<u32>("start").copied().unwrap_or_default();
    let stop = matches.get_one::<u32>("stop").copied().unwrap_or_default();

    let opts = CggttsOptions::default()
        .with_naming(parse_arg::<NamingConvention>(matches, "naming")?)
        .with_bad_tracks(matches.get_flag("bad-tracks"));

    let match_opts = MatchOptions::default()
        .with_mode(parse_arg::<MatchMode>(matches, "mode")?)
        .with_ephemeris(matches.get_flag("ephemeris"));

    let column = parse_arg::<Column>(matches, "column")?;

    let lhs = Cggtts::load_range(
        start,
        stop,
        arg(matches, "lhs"),
        arg(matches, "lhs-stub"),
        &opts,
    )?;
    let rhs = Cggtts::load_range(
        start,
        stop,
        arg(matches, "rhs"),
        arg(matches, "rhs-stub"),
        &opts,
    )?;

    if identification {
        for (name, data) in [("lhs", &lhs), ("rhs", &rhs)] {
            info!("{} LAB              \"{}\"", name, data.header.lab);
            info!("{} REFERENCE TIME   {}", name, data.header.reference_time);
            info!("{} NUMBER OF TRACKS {}", name, data.len());
            info!("{} BAD TRACKS       {}", name, data.bad_tracks());
            info!(
                "{} SV               {}",
                name,
                data.satellites().iter().map(|sv| sv.to_string()).join(", ")
            );
        }
        return Ok(());
    }

    let series = lhs.averaged_difference(&rhs, column, &match_opts)?;
    info!("{} common epochs", series.len());
    print_series(&column.to_string(), &series);
    Ok(())
}

pub fn main() {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder
        .target(Target::Stderr)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cli = Cli::new();
    let identification = cli.identification();

    let result = match cli.subcommand() {
        Some(("rinex", matches)) => rinex(matches, identification),
        Some(("cggtts", matches)) => cggtts(matches, identification),
        _ => Ok(()),
    };

    if let Err(e) = result {
        error!("{}", e);
        std::process::exit(1);
    }
}
