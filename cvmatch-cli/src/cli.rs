use clap::{value_parser, Arg, ArgAction, ArgMatches, ColorChoice, Command};

pub struct Cli {
    /// Arguments passed by user
    matches: ArgMatches,
}

impl Cli {
    /// Build new command line interface
    pub fn new() -> Self {
        Self {
            matches: {
                Command::new("cvmatch-cli")
                    .author("Guillaume W. Bres, <guillaume.bressaix@gmail.com>")
                    .version(env!("CARGO_PKG_VERSION"))
                    .about("Common view matching of two remote sites, from CGGTTS or RINEX data")
                    .arg_required_else_help(true)
                    .color(ColorChoice::Always)
                    .arg(Arg::new("id")
                        .short('i')
                        .global(true)
                        .action(ArgAction::SetTrue)
                        .help("Identify both setups, then exit."))
                    .subcommand(Command::new("rinex")
                        .about("Match two Observation RINEX files, print the averaged difference (CSV).")
                        .arg(Arg::new("lhs")
                            .long("lhs")
                            .value_name("FILE")
                            .required(true)
                            .help("Local Observation RINEX"))
                        .arg(Arg::new("rhs")
                            .long("rhs")
                            .value_name("FILE")
                            .required(true)
                            .help("Remote Observation RINEX"))
                        .arg(Arg::new("constellation")
                            .short('c')
                            .long("constellation")
                            .value_name("SYSTEM")
                            .default_value("GPS")
                            .help("Constellation to match: GPS, Glonass, Galileo or BeiDou"))
                        .arg(Arg::new("code")
                            .long("code")
                            .value_name("CODE")
                            .required(true)
                            .help("Observation code to match, for example \"C1\" (V2) or \"C1C\" (V3)"))
                        .arg(Arg::new("progress")
                            .short('p')
                            .action(ArgAction::SetTrue)
                            .help("Report parsing progress"))
                        .arg(Arg::new("skip-unsupported")
                            .long("skip-unsupported")
                            .action(ArgAction::SetTrue)
                            .help("Skip QZSS, SBAS and IRNSS observations instead of failing")))
                    .subcommand(Command::new("cggtts")
                        .about("Match two sets of daily CGGTTS files, print the averaged difference (CSV).")
                        .arg(Arg::new("start")
                            .long("start")
                            .value_name("MJD")
                            .required(true)
                            .value_parser(value_parser!(u32))
                            .help("First day to load"))
                        .arg(Arg::new("stop")
                            .long("stop")
                            .value_name("MJD")
                            .required(true)
                            .value_parser(value_parser!(u32))
                            .help("Last day to load (included)"))
                        .arg(Arg::new("lhs")
                            .long("lhs")
                            .value_name("DIRECTORY")
                            .required(true)
                            .help("Local files directory"))
                        .arg(Arg::new("lhs-stub")
                            .long("lhs-stub")
                            .value_name("STUB")
                            .required(true)
                            .help("Local files name stub"))
                        .arg(Arg::new("rhs")
                            .long("rhs")
                            .value_name("DIRECTORY")
                            .required(true)
                            .help("Remote files directory"))
                        .arg(Arg::new("rhs-stub")
                            .long("rhs-stub")
                            .value_name("STUB")
                            .required(true)
                            .help("Remote files name stub"))
                        .arg(Arg::new("naming")
                            .long("naming")
                            .value_name("CONVENTION")
                            .default_value("simple")
                            .help("File naming convention: \"simple\" ({MJD}{stub}) or \"lab\" ({stub}{YY}.{DDD})"))
                        .arg(Arg::new("column")
                            .long("column")
                            .value_name("COLUMN")
                            .default_value("REFSYS")
                            .help("Column to difference"))
                        .arg(Arg::new("mode")
                            .short('m')
                            .long("mode")
                            .value_name("MODE")
                            .default_value("tracks")
                            .help("Matching mode: \"tracks\" (same epoch and satellite) or \"tracktime\" (same epoch)"))
                        .arg(Arg::new("ephemeris")
                            .short('e')
                            .long("ephemeris")
                            .action(ArgAction::SetTrue)
                            .help("Matched tracks must share the same IOE"))
                        .arg(Arg::new("bad-tracks")
                            .long("keep-bad-tracks")
                            .action(ArgAction::SetTrue)
                            .help("Preserve bad tracks")))
                    .get_matches()
            },
        }
    }
    /// Selected mode and its arguments
    pub fn subcommand(&self) -> Option<(&str, &ArgMatches)> {
        self.matches.subcommand()
    }
    pub fn identification(&self) -> bool {
        self.matches.get_flag("id")
            || self
                .matches
                .subcommand()
                .map(|(_, matches)| matches.get_flag("id"))
                .unwrap_or(false)
    }
}

/// Returns this argument, which either is required or has a default value
pub fn arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(|s| s.as_str())
        .unwrap_or_default()
}
