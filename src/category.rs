//! The four kinds of data a run can fetch, and the downloader arguments for each.

use std::{fmt, path::Path};

use crate::{config::RunConfig, timestamp::ModelRun};

/// Data categories, in the order they are dispatched.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter, IntoStaticStr, Hash)]
pub enum Category {
    /// Fields on one fixed surface, e.g. 2 m temperature.
    #[strum(serialize = "single-level")]
    SingleLevel,
    /// Fields on the model's native levels.
    #[strum(serialize = "model-level")]
    ModelLevel,
    /// Fields on fixed pressure surfaces.
    #[strum(serialize = "pressure-level")]
    PressureLevel,
    /// Static fields with no forecast time, e.g. half level heights.
    #[strum(serialize = "time-invariant")]
    TimeInvariant,
}

impl Category {
    /// Short name used in logs.
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// The downloader flag that carries this category's field list.
    pub fn fields_flag(self) -> &'static str {
        match self {
            Category::SingleLevel => "--single-level-fields",
            Category::ModelLevel => "--model-level-fields",
            Category::PressureLevel => "--pressure-level-fields",
            Category::TimeInvariant => "--time-invariant-fields",
        }
    }

    /// Build the invocation for this category, `None` if it has no fields selected.
    ///
    /// `modelrun` pins the downloader to one run, see [`common_args`].
    pub fn invocation(
        self,
        config: &RunConfig,
        directory: &Path,
        modelrun: Option<ModelRun>,
    ) -> Option<Invocation> {
        let fields = config.fields().fields(self);
        if fields.is_empty() {
            return None;
        }

        let mut args = common_args(config, directory, modelrun);

        args.push(self.fields_flag().to_owned());
        args.extend(fields.iter().cloned());

        let steps = config.steps();
        let levels = config.model_levels();
        match self {
            Category::SingleLevel => {
                push_range(&mut args, "time-step", steps.min, steps.max);
            }
            Category::ModelLevel => {
                push_range(&mut args, "time-step", steps.min, steps.max);
                push_range(&mut args, "model-level", levels.min, levels.max);
            }
            Category::PressureLevel => {
                push_range(&mut args, "time-step", steps.min, steps.max);
                args.push("--pressure-levels".to_owned());
                args.extend(config.pressure_levels().iter().cloned());
            }
            Category::TimeInvariant => {
                // No time dimension, a single instant.
                push_range(&mut args, "time-step", 0, 0);
                if config.time_invariant_levels() {
                    push_range(&mut args, "model-level", levels.min, levels.max);
                }
            }
        }

        Some(Invocation {
            category: self,
            args,
        })
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// One planned downloader run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    /// What is being fetched.
    pub category: Category,
    /// Arguments after the downloader program and its leading arguments.
    pub args: Vec<String>,
}

/// Flags shared by every download invocation of a run.
///
/// `--modelrun` is only written when `modelrun` is given. Pass the configured run, or the
/// resolved one, so every category fetches the run its directory is named after.
pub fn common_args(
    config: &RunConfig,
    directory: &Path,
    modelrun: Option<ModelRun>,
) -> Vec<String> {
    let mut args = vec!["--model".to_owned(), config.model().as_str().to_owned()];

    if let Some(grid) = config.grid() {
        args.push("--grid".to_owned());
        args.push(grid.as_str().to_owned());
    }

    args.push("--directory".to_owned());
    args.push(directory.to_string_lossy().into_owned());

    if let Some(run) = modelrun {
        args.push("--modelrun".to_owned());
        args.push(run.to_string());
    }
    if config.compressed() {
        args.push("--compressed".to_owned());
    }
    if let Some(workers) = config.max_workers() {
        args.push("--max-workers".to_owned());
        args.push(workers.to_string());
    }
    if let Some(proxy) = config.http_proxy() {
        args.push("--http-proxy".to_owned());
        args.push(proxy.to_owned());
    }
    if config.verbose() {
        args.push("--verbose".to_owned());
    }
    if config.dry_run() {
        args.push("--dry-run".to_owned());
    }
    if config.reload() {
        args.push("--reload".to_owned());
    }

    args.extend(config.extra_flags().iter().cloned());

    args
}

fn push_range(args: &mut Vec<String>, name: &str, min: u32, max: u32) {
    args.push(format!("--min-{}", name));
    args.push(min.to_string());
    args.push(format!("--max-{}", name));
    args.push(max.to_string());
}

/*--------------------------------------------------------------------------------------------------
                                          Unit Tests
--------------------------------------------------------------------------------------------------*/
#[cfg(test)]
mod unit {
    use super::*;

    use std::path::PathBuf;

    use strum::IntoEnumIterator;

    use crate::models::{Grid, Model};

    fn dir() -> PathBuf {
        PathBuf::from("/data/opendata/2020121212")
    }

    // Value following the first occurrence of a flag.
    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_dispatch_order() {
        let order: Vec<Category> = Category::iter().collect();
        assert_eq!(
            order,
            vec![
                Category::SingleLevel,
                Category::ModelLevel,
                Category::PressureLevel,
                Category::TimeInvariant
            ]
        );
    }

    #[test]
    fn test_empty_category_has_no_invocation() {
        let cfg = RunConfig::builder()
            .model(Model::IconD2)
            .root("/data/opendata")
            .single_level_fields(&["t_2m"])
            .build()
            .unwrap();

        assert!(Category::SingleLevel.invocation(&cfg, &dir(), None).is_some());
        assert!(Category::ModelLevel.invocation(&cfg, &dir(), None).is_none());
        assert!(Category::PressureLevel.invocation(&cfg, &dir(), None).is_none());
        assert!(Category::TimeInvariant.invocation(&cfg, &dir(), None).is_none());
    }

    #[test]
    fn test_single_level_args() {
        let cfg = RunConfig::builder()
            .model(Model::IconD2)
            .grid(Grid::RegularLatLon)
            .root("/data/opendata")
            .compressed(true)
            .single_level_fields(&["t_2m pmsl"])
            .min_step(0)
            .max_step(2)
            .build()
            .unwrap();

        let inv = Category::SingleLevel.invocation(&cfg, &dir(), None).unwrap();
        assert_eq!(
            inv.args,
            vec![
                "--model",
                "icon-d2",
                "--grid",
                "regular-lat-lon",
                "--directory",
                "/data/opendata/2020121212",
                "--compressed",
                "--single-level-fields",
                "t_2m",
                "pmsl",
                "--min-time-step",
                "0",
                "--max-time-step",
                "2",
            ]
        );
    }

    #[test]
    fn test_model_level_args() {
        let cfg = RunConfig::builder()
            .model(Model::IconD2)
            .root("/data/opendata")
            .model_level_fields(&["u", "v"])
            .min_step(1)
            .max_step(3)
            .min_model_level(60)
            .max_model_level(65)
            .build()
            .unwrap();

        let inv = Category::ModelLevel.invocation(&cfg, &dir(), None).unwrap();
        assert_eq!(inv.category, Category::ModelLevel);
        assert_eq!(flag_value(&inv.args, "--model-level-fields"), Some("u"));
        assert_eq!(flag_value(&inv.args, "--min-time-step"), Some("1"));
        assert_eq!(flag_value(&inv.args, "--max-time-step"), Some("3"));
        assert_eq!(flag_value(&inv.args, "--min-model-level"), Some("60"));
        assert_eq!(flag_value(&inv.args, "--max-model-level"), Some("65"));
        assert!(!inv.args.iter().any(|a| a == "--pressure-levels"));
    }

    #[test]
    fn test_pressure_levels_verbatim() {
        let cfg = RunConfig::builder()
            .model(Model::IconD2)
            .root("/data/opendata")
            .pressure_level_fields(&["t"])
            .pressure_levels(&["975 950"])
            .build()
            .unwrap();

        let inv = Category::PressureLevel.invocation(&cfg, &dir(), None).unwrap();
        let tail = &inv.args[inv.args.len() - 3..];
        assert_eq!(tail, &["--pressure-levels", "975", "950"]);
        assert!(!inv.args.iter().any(|a| a == "--min-model-level"));

        let cfg = RunConfig::builder()
            .model(Model::IconD2)
            .root("/data/opendata")
            .pressure_level_fields(&["t"])
            .pressure_levels(&["0975", "+950", "975"])
            .build()
            .unwrap();

        let inv = Category::PressureLevel.invocation(&cfg, &dir(), None).unwrap();
        let tail = &inv.args[inv.args.len() - 4..];
        assert_eq!(tail, &["--pressure-levels", "0975", "+950", "975"]);
    }

    #[test]
    fn test_time_invariant_args() {
        let builder = RunConfig::builder()
            .model(Model::IconD2)
            .root("/data/opendata")
            .time_invariant_fields(&["hhl"])
            .min_step(0)
            .max_step(12)
            .min_model_level(1)
            .max_model_level(66);

        let cfg = builder.clone().build().unwrap();
        let inv = Category::TimeInvariant.invocation(&cfg, &dir(), None).unwrap();
        assert_eq!(flag_value(&inv.args, "--time-invariant-fields"), Some("hhl"));
        assert_eq!(flag_value(&inv.args, "--min-time-step"), Some("0"));
        assert_eq!(flag_value(&inv.args, "--max-time-step"), Some("0"));
        assert_eq!(flag_value(&inv.args, "--min-model-level"), Some("1"));
        assert_eq!(flag_value(&inv.args, "--max-model-level"), Some("66"));

        let cfg = builder.time_invariant_levels(false).build().unwrap();
        let inv = Category::TimeInvariant.invocation(&cfg, &dir(), None).unwrap();
        assert!(!inv.args.iter().any(|a| a.ends_with("model-level")));
    }

    #[test]
    fn test_common_args_pass_through() {
        let cfg = RunConfig::builder()
            .model(Model::IconEu)
            .root("/data/opendata")
            .single_level_fields(&["t_2m"])
            .modelrun("2020121206")
            .max_workers(8)
            .http_proxy("proxy:8080")
            .verbose(true)
            .dry_run(true)
            .reload(true)
            .extra_flags(&["--flat"])
            .build()
            .unwrap();

        let args = common_args(&cfg, &dir(), cfg.modelrun());
        assert_eq!(flag_value(&args, "--modelrun"), Some("2020121206"));
        assert_eq!(flag_value(&args, "--max-workers"), Some("8"));
        assert_eq!(flag_value(&args, "--http-proxy"), Some("proxy:8080"));
        for flag in &["--verbose", "--dry-run", "--reload"] {
            assert!(args.iter().any(|a| a == flag), "missing {}", flag);
        }
        assert_eq!(args.last().map(String::as_str), Some("--flat"));
        assert!(!args.iter().any(|a| a == "--grid" || a == "--compressed"));
    }

    #[test]
    fn test_modelrun_only_when_pinned() {
        let cfg = RunConfig::builder()
            .model(Model::Icon)
            .root("/data/opendata")
            .single_level_fields(&["t_2m"])
            .build()
            .unwrap();

        assert!(!common_args(&cfg, &dir(), None).iter().any(|a| a == "--modelrun"));

        let run = ModelRun::parse("2020121212").ok();
        let args = common_args(&cfg, &dir(), run);
        assert_eq!(flag_value(&args, "--modelrun"), Some("2020121212"));
        // Right after the directory.
        assert_eq!(flag_value(&args, "--directory"), Some("/data/opendata/2020121212"));
        assert_eq!(args[4], "--modelrun");
    }

    #[test]
    fn test_names() {
        assert_eq!(Category::SingleLevel.as_str(), "single-level");
        assert_eq!(Category::TimeInvariant.to_string(), "time-invariant");
        assert_eq!(format!("{:>15}|", Category::ModelLevel), "    model-level|");
    }
}
