//! Command line options that are used across applications.

use std::path::{Path, PathBuf};

use clap::{App, Arg, ArgMatches};

use crate::{
    config::{Profile, RunConfig, RunConfigBuilder},
    errors::FetchErr,
};

/// Struct to package up command line arguments.
#[derive(Clone, Debug)]
pub struct CommonCmdLineArgs {
    // The validated run configuration
    config: RunConfig,
    // Profile the configuration started from, if any
    profile: Option<PathBuf>,
    // Only resolve and print the latest timestamp
    latest_only: bool,
}

impl CommonCmdLineArgs {
    /// Create a new set of args.
    pub fn new_app(app_name: &'static str, about: &'static str) -> App<'static, 'static> {
        App::new(app_name)
            .about(about)
            .version(clap::crate_version!())
            .arg(
                Arg::with_name("model")
                    .short("m")
                    .long("model")
                    .takes_value(true)
                    .help("The model name, e.g. icon-d2, icon-eu, cosmo-d2."),
            ).arg(
                Arg::with_name("grid")
                    .short("g")
                    .long("grid")
                    .takes_value(true)
                    .help("The grid type, icosahedral, regular-lat-lon or rotated-lat-lon."),
            ).arg(
                Arg::with_name("root")
                    .short("r")
                    .long("root")
                    .takes_value(true)
                    .help("Base output directory.")
                    .long_help(
                        "Base output directory. Files land in <root>/<timestamp>. Defaults to '${HOME}/opendata'",
                    ),
            ).arg(
                Arg::with_name("profile")
                    .short("p")
                    .long("profile")
                    .takes_value(true)
                    .help("TOML file with run settings, command line options take precedence."),
            ).arg(
                Arg::with_name("downloader")
                    .long("downloader")
                    .takes_value(true)
                    .help("Command that starts the downloader.")
                    .long_help(
                        "Command that starts the downloader, split on whitespace. Defaults to 'python3 opendata-downloader.py'",
                    ),
            ).arg(
                Arg::with_name("modelrun")
                    .long("modelrun")
                    .takes_value(true)
                    .value_name("YYYYMMDDHH")
                    .help("Use this model run instead of the latest one."),
            ).arg(
                Arg::with_name("compressed")
                    .short("c")
                    .long("compressed")
                    .help("Keep the files bz2 compressed."),
            ).arg(fields_arg(
                "single-level-fields",
                "Single-level fields, e.g. t_2m pmsl clch.",
            )).arg(fields_arg(
                "model-level-fields",
                "Model-level fields, e.g. u v p.",
            )).arg(fields_arg(
                "pressure-level-fields",
                "Pressure-level fields, needs --pressure-levels.",
            )).arg(fields_arg(
                "time-invariant-fields",
                "Time-invariant fields, e.g. hhl.",
            )).arg(number_arg(
                "min-time-step",
                "First forecast step (default 0).",
            )).arg(number_arg(
                "max-time-step",
                "Last forecast step (default 0).",
            )).arg(number_arg(
                "min-model-level",
                "Lowest model level (default 0, the model's own).",
            )).arg(number_arg(
                "max-model-level",
                "Highest model level (default 0, the model's own).",
            )).arg(
                Arg::with_name("pressure-levels")
                    .long("pressure-levels")
                    .takes_value(true)
                    .multiple(true)
                    .value_name("HPA")
                    .help("Pressure levels, passed on in the given order, e.g. 975 950."),
            ).arg(
                Arg::with_name("no-time-invariant-levels")
                    .long("no-time-invariant-levels")
                    .help("Do not pass the model-level range with time-invariant fields."),
            ).arg(number_arg(
                "max-workers",
                "Parallel downloads inside the downloader.",
            )).arg(
                Arg::with_name("http-proxy")
                    .long("http-proxy")
                    .takes_value(true)
                    .value_name("HOST:PORT")
                    .help("HTTP proxy for the downloader."),
            ).arg(
                Arg::with_name("extra-flag")
                    .long("extra-flag")
                    .takes_value(true)
                    .multiple(true)
                    .number_of_values(1)
                    .allow_hyphen_values(true)
                    .help("Flag passed verbatim to every download, may be repeated."),
            ).arg(
                Arg::with_name("dry-run")
                    .short("d")
                    .long("dry-run")
                    .help("Ask the downloader to only show what it would fetch."),
            ).arg(
                Arg::with_name("reload")
                    .long("reload")
                    .help("Ask the downloader to fetch files that already exist."),
            ).arg(
                Arg::with_name("verbose")
                    .short("v")
                    .long("verbose")
                    .help("Verbose logging here and in the downloader."),
            ).arg(
                Arg::with_name("latest-only")
                    .long("latest-only")
                    .help("Print the latest model run and exit."),
            ).after_help(concat!(
                "Field lists may be given as several values or as one quoted, space separated ",
                "value. A category with no fields is skipped.\n\n",
                "Exit status is 0 on success, 1 if the run could not start, 2 if any category ",
                "failed and 130 if interrupted."
            ))
    }

    /// Build the configuration from parsed matches. Parsing is left to the caller so it can
    /// look at its own arguments, e.g. verbosity, before the configuration is validated.
    pub fn from_matches(matches: &ArgMatches) -> Result<Self, FetchErr> {
        let profile = matches.value_of("profile").map(PathBuf::from);
        let latest_only = matches.is_present("latest-only");

        let mut builder = RunConfig::builder();
        if let Some(path) = &profile {
            builder = builder.apply_profile(Profile::load(path)?);
        }

        let config = apply_matches(builder, matches)?.build()?;

        Ok(CommonCmdLineArgs {
            config,
            profile,
            latest_only,
        })
    }

    /// Get the run configuration
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Get the profile path, if one was given
    pub fn profile(&self) -> Option<&Path> {
        self.profile.as_deref()
    }

    /// Only resolve the timestamp.
    pub fn latest_only(&self) -> bool {
        self.latest_only
    }
}

fn fields_arg(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .multiple(true)
        .value_name("FIELD")
        .help(help)
}

fn number_arg(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .value_name("N")
        .help(help)
}

fn apply_matches(
    mut builder: RunConfigBuilder,
    matches: &ArgMatches,
) -> Result<RunConfigBuilder, FetchErr> {
    if let Some(model) = matches.value_of("model") {
        builder = builder.model_name(model);
    }
    if let Some(grid) = matches.value_of("grid") {
        builder = builder.grid_name(grid);
    }
    if let Some(root) = matches.value_of("root") {
        builder = builder.root(root);
    }
    if let Some(cmd) = matches.value_of("downloader") {
        builder = builder.downloader(cmd.split_whitespace());
    }
    if let Some(run) = matches.value_of("modelrun") {
        builder = builder.modelrun(run);
    }
    if let Some(proxy) = matches.value_of("http-proxy") {
        builder = builder.http_proxy(proxy);
    }

    if let Some(fields) = matches.values_of("single-level-fields") {
        builder = builder.single_level_fields(fields);
    }
    if let Some(fields) = matches.values_of("model-level-fields") {
        builder = builder.model_level_fields(fields);
    }
    if let Some(fields) = matches.values_of("pressure-level-fields") {
        builder = builder.pressure_level_fields(fields);
    }
    if let Some(fields) = matches.values_of("time-invariant-fields") {
        builder = builder.time_invariant_fields(fields);
    }
    if let Some(levels) = matches.values_of("pressure-levels") {
        builder = builder.pressure_levels(levels);
    }
    if let Some(flags) = matches.values_of("extra-flag") {
        builder = builder.extra_flags(flags);
    }

    if let Some(step) = parse_number(matches, "min-time-step")? {
        builder = builder.min_step(step);
    }
    if let Some(step) = parse_number(matches, "max-time-step")? {
        builder = builder.max_step(step);
    }
    if let Some(level) = parse_number(matches, "min-model-level")? {
        builder = builder.min_model_level(level);
    }
    if let Some(level) = parse_number(matches, "max-model-level")? {
        builder = builder.max_model_level(level);
    }
    if let Some(workers) = parse_number(matches, "max-workers")? {
        builder = builder.max_workers(workers);
    }

    // Switches only override the profile when they are given.
    if matches.is_present("compressed") {
        builder = builder.compressed(true);
    }
    if matches.is_present("no-time-invariant-levels") {
        builder = builder.time_invariant_levels(false);
    }
    if matches.is_present("dry-run") {
        builder = builder.dry_run(true);
    }
    if matches.is_present("reload") {
        builder = builder.reload(true);
    }
    if matches.is_present("verbose") {
        builder = builder.verbose(true);
    }

    Ok(builder)
}

fn parse_number(matches: &ArgMatches, name: &str) -> Result<Option<u32>, FetchErr> {
    matches
        .value_of(name)
        .map(|val| {
            val.trim().parse::<u32>().map_err(|_| {
                FetchErr::InvalidConfig(format!(
                    "invalid {}, not a non-negative integer: {}",
                    name, val
                ))
            })
        })
        .transpose()
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;

    use std::fs;

    use tempdir::TempDir;

    use crate::{
        config::StepRange,
        models::{Grid, Model},
    };

    fn parse(args: &[&str]) -> Result<CommonCmdLineArgs, FetchErr> {
        let app = CommonCmdLineArgs::new_app("gribdn", "test");
        let matches = app
            .get_matches_from_safe(std::iter::once("gribdn").chain(args.iter().cloned()))
            .expect("clap rejected the arguments");
        CommonCmdLineArgs::from_matches(&matches)
    }

    #[test]
    fn test_script_style_invocation() {
        let args = parse(&[
            "--model",
            "icon-d2",
            "--grid",
            "regular-lat-lon",
            "--root",
            "/data/opendata",
            "--single-level-fields",
            "t_2m pmsl",
            "--pressure-level-fields",
            "t",
            "fi",
            "--pressure-levels",
            "975",
            "950",
            "--min-time-step",
            "0",
            "--max-time-step",
            "2",
            "--compressed",
            "--max-workers",
            "4",
            "--extra-flag",
            "--flat",
        ])
        .unwrap();

        let cfg = args.config();
        assert_eq!(cfg.model(), Model::IconD2);
        assert_eq!(cfg.grid(), Some(Grid::RegularLatLon));
        assert_eq!(cfg.root(), Path::new("/data/opendata"));
        assert_eq!(cfg.fields().single_level, vec!["t_2m", "pmsl"]);
        assert_eq!(cfg.fields().pressure_level, vec!["t", "fi"]);
        assert_eq!(cfg.pressure_levels(), &["975", "950"]);
        assert_eq!(cfg.steps(), StepRange { min: 0, max: 2 });
        assert!(cfg.compressed());
        assert_eq!(cfg.extra_flags(), &["--flat"]);
        assert_eq!(cfg.max_workers(), Some(4));
        assert!(!args.latest_only());
        assert!(args.profile().is_none());
    }

    #[test]
    fn test_downloader_command_is_split() {
        let args = parse(&[
            "--model",
            "icon",
            "--root",
            "/tmp",
            "--time-invariant-fields",
            "hhl",
            "--downloader",
            "python3 ./opendata-downloader.py",
        ])
        .unwrap();
        assert_eq!(
            args.config().downloader(),
            &["python3", "./opendata-downloader.py"]
        );
    }

    #[test]
    fn test_bad_numbers_are_config_errors() {
        let res = parse(&[
            "--model",
            "icon",
            "--root",
            "/tmp",
            "--single-level-fields",
            "t_2m",
            "--max-time-step",
            "twelve",
        ]);
        assert!(matches!(res, Err(FetchErr::InvalidConfig(_))));
    }

    #[test]
    fn test_no_fields_is_accepted() {
        let args = parse(&["--model", "icon-eu", "--root", "/tmp", "--latest-only"]).unwrap();
        assert!(args.latest_only());
        assert!(args.config().fields().is_empty());

        let args = parse(&["--model", "icon-eu", "--root", "/tmp"]).unwrap();
        assert!(!args.latest_only());
        assert!(args.config().fields().is_empty());
    }

    #[test]
    fn test_command_line_overrides_profile() {
        let tmp = TempDir::new("opendata-fetch-cmdline").unwrap();
        let path = tmp.path().join("profile.toml");
        fs::write(
            &path,
            concat!(
                "model = \"icon-eu\"\n",
                "root = \"/srv/opendata\"\n",
                "[fields]\n",
                "single_level = \"t_2m\"\n",
                "[steps]\n",
                "max = 12\n",
            ),
        )
        .unwrap();
        let profile = path.to_str().unwrap();

        let args = parse(&["--profile", profile, "--model", "icon-d2", "--max-time-step", "3"])
            .unwrap();

        let cfg = args.config();
        assert_eq!(args.profile(), Some(path.as_path()));
        assert_eq!(cfg.model(), Model::IconD2);
        assert_eq!(cfg.root(), Path::new("/srv/opendata"));
        assert_eq!(cfg.fields().single_level, vec!["t_2m"]);
        assert_eq!(cfg.steps(), StepRange { min: 0, max: 3 });
    }
}
