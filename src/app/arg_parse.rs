use std::{ffi::OsString, path::PathBuf, str::FromStr};

use crate::{
    app::*,
    library::{
        definitions::{DEFAULT_GP, DEFAULT_PLOT},
        GpCfg, LoadCfg, PlotCfg, ShortRowPolicy,
    },
};

pub fn parse_args() -> Result<AppCfg, AppError> {
    parse_args_from(std::env::args_os())
}

pub fn parse_args_from<I, T>(args: I) -> Result<AppCfg, AppError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let video_info = "video-info";
    let annotations = "annotations";
    let video = "video";
    let fit = "fit";
    let kernel_variance = "kernel-variance";
    let lengthscale = "lengthscale";
    let noise_variance = "noise-variance";
    let plot_dir = "plot-dir";
    let n_boot = "n-boot";
    let seed = "seed";
    let font = "font";
    let plot_width = "plot-width";
    let plot_height = "plot-height";
    let skip_short_rows = "skip-short-rows";
    let json_output = "json-output";
    let quiet = "quiet";
    let verbose = "verbose";

    let default_kernel_variance = DEFAULT_GP.kernel_variance.to_string();
    let default_lengthscale = DEFAULT_GP.lengthscale.to_string();
    let default_noise_variance = DEFAULT_GP.noise_variance.to_string();
    let default_n_boot = DEFAULT_PLOT.n_boot.to_string();
    let default_seed = DEFAULT_PLOT.seed.to_string();
    let default_plot_width = DEFAULT_PLOT.width.to_string();
    let default_plot_height = DEFAULT_PLOT.height.to_string();

    //args are not added through method chaining because this appears to break rustfmt.
    let mut clap_app = clap::App::new("vidsummar")
        .version("0.1")
        .about("Models per-frame video importance annotations with Gaussian Process regression");

    clap_app = clap_app.arg(
        clap::Arg::with_name(video_info)
            .long(video_info)
            .required(true)
            .takes_value(true)
            .value_name("FILE")
            .help("TSV of video metadata: genre, id, title, url, duration (MM:SS)")
            .display_order(1),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(annotations)
            .long(annotations)
            .required(true)
            .takes_value(true)
            .value_name("FILE")
            .help("TSV of annotations: id, genre, comma separated per-frame ratings")
            .display_order(2),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(video)
            .long(video)
            .multiple(true)
            .min_values(1)
            .takes_value(true)
            .value_name("ID")
            .help("Only process these video ids")
            .display_order(3),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(fit)
            .long(fit)
            .help("Fit a Gaussian Process to each video and predict the importance of every frame"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(kernel_variance)
            .long(kernel_variance)
            .takes_value(true)
            .default_value(&default_kernel_variance)
            .help("Variance of the RBF kernel"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(lengthscale)
            .long(lengthscale)
            .takes_value(true)
            .default_value(&default_lengthscale)
            .help("Lengthscale of the RBF kernel, in frames"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(noise_variance)
            .long(noise_variance)
            .takes_value(true)
            .default_value(&default_noise_variance)
            .help("Variance of the Gaussian observation noise"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(plot_dir)
            .long(plot_dir)
            .takes_value(true)
            .value_name("DIR")
            .help("Write plots for each video into this directory"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(n_boot)
            .long(n_boot)
            .takes_value(true)
            .default_value(&default_n_boot)
            .help("Number of bootstrap resamples drawn in the ratings plot"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(seed)
            .long(seed)
            .takes_value(true)
            .default_value(&default_seed)
            .help("Seed for bootstrap resampling"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(font)
            .long(font)
            .takes_value(true)
            .value_name("TTF")
            .help("TrueType font used for plot titles and labels. Plots are unlabelled without one."),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(plot_width)
            .long(plot_width)
            .takes_value(true)
            .default_value(&default_plot_width),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(plot_height)
            .long(plot_height)
            .takes_value(true)
            .default_value(&default_plot_height),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(skip_short_rows)
            .long(skip_short_rows)
            .help("Skip annotation rows with fewer than 3 fields instead of stopping at the first one"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(json_output)
            .long(json_output)
            .help("Print outputs in json format"),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(quiet)
            .long(quiet)
            .help("Quiet verbosity: Only print errors, warnings and output")
            .conflicts_with(verbose),
    );

    clap_app = clap_app.arg(
        clap::Arg::with_name(verbose)
            .long(verbose)
            .help("Print trace level logs"),
    );

    let matches = match clap_app.get_matches_from_safe(args) {
        Ok(matches) => matches,
        //--help and --version are reported through this path too.
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => return Err(AppError::ArgParseError(e.message)),
    };

    fn parse_value<V: FromStr>(matches: &clap::ArgMatches, arg: &'static str) -> Result<V, AppError> {
        let value = matches.value_of(arg).unwrap_or_else(|| unreachable!());
        value.parse().map_err(|_| AppError::ParseValueError {
            arg,
            value: value.to_string(),
        })
    }

    let load_cfg = LoadCfg {
        video_info_path: PathBuf::from(matches.value_of_os(video_info).unwrap_or_else(|| unreachable!())),
        annotations_path: PathBuf::from(matches.value_of_os(annotations).unwrap_or_else(|| unreachable!())),
        short_rows: if matches.is_present(skip_short_rows) {
            ShortRowPolicy::Skip
        } else {
            ShortRowPolicy::Stop
        },
    };

    let gp_cfg = GpCfg {
        kernel_variance: parse_value(&matches, kernel_variance)?,
        lengthscale: parse_value(&matches, lengthscale)?,
        noise_variance: parse_value(&matches, noise_variance)?,
    };

    let plot_cfg = PlotCfg {
        width: parse_value(&matches, plot_width)?,
        height: parse_value(&matches, plot_height)?,
        n_boot: parse_value(&matches, n_boot)?,
        seed: parse_value(&matches, seed)?,
    };

    let verbosity = if matches.is_present(quiet) {
        ReportVerbosity::Quiet
    } else if matches.is_present(verbose) {
        ReportVerbosity::Verbose
    } else {
        ReportVerbosity::Default
    };

    let output_cfg = OutputCfg {
        json_output: matches.is_present(json_output),
        plot_dir: matches.value_of_os(plot_dir).map(PathBuf::from),
        font_path: matches.value_of_os(font).map(PathBuf::from),
        verbosity,
    };

    let video_ids = match matches.values_of(video) {
        Some(ids) => ids.map(str::to_string).collect(),
        None => vec![],
    };

    Ok(AppCfg {
        load_cfg,
        gp_cfg,
        plot_cfg,
        output_cfg,
        video_ids,
        fit: matches.is_present(fit),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<AppCfg, AppError> {
        let base = ["vidsummar", "--video-info", "info.tsv", "--annotations", "anno.tsv"];
        parse_args_from(base.iter().chain(extra.iter()).copied())
    }

    #[test]
    fn test_defaults() {
        let cfg = parse(&[]).unwrap();

        assert_eq!(cfg.load_cfg.video_info_path, PathBuf::from("info.tsv"));
        assert_eq!(cfg.load_cfg.annotations_path, PathBuf::from("anno.tsv"));
        assert_eq!(cfg.load_cfg.short_rows, ShortRowPolicy::Stop);
        assert_eq!(cfg.gp_cfg, DEFAULT_GP);
        assert_eq!(cfg.plot_cfg, DEFAULT_PLOT);
        assert_eq!(cfg.output_cfg.verbosity, ReportVerbosity::Default);
        assert!(cfg.output_cfg.plot_dir.is_none());
        assert!(!cfg.output_cfg.json_output);
        assert!(cfg.video_ids.is_empty());
        assert!(!cfg.fit);
    }

    #[test]
    fn test_all_options() {
        let cfg = parse(&[
            "--fit",
            "--kernel-variance",
            "3.5",
            "--lengthscale",
            "120",
            "--noise-variance",
            "0.5",
            "--plot-dir",
            "plots",
            "--n-boot",
            "50",
            "--seed",
            "9",
            "--plot-width",
            "800",
            "--plot-height",
            "600",
            "--skip-short-rows",
            "--json-output",
            "--verbose",
            "--video",
            "a",
            "b",
        ])
        .unwrap();

        assert!(cfg.fit);
        assert_eq!(
            cfg.gp_cfg,
            GpCfg {
                kernel_variance: 3.5,
                lengthscale: 120.0,
                noise_variance: 0.5
            }
        );
        assert_eq!(
            cfg.plot_cfg,
            PlotCfg {
                width: 800,
                height: 600,
                n_boot: 50,
                seed: 9
            }
        );
        assert_eq!(cfg.output_cfg.plot_dir, Some(PathBuf::from("plots")));
        assert_eq!(cfg.load_cfg.short_rows, ShortRowPolicy::Skip);
        assert!(cfg.output_cfg.json_output);
        assert_eq!(cfg.output_cfg.verbosity, ReportVerbosity::Verbose);
        assert_eq!(cfg.video_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_bad_number() {
        match parse(&["--lengthscale", "long"]) {
            Err(AppError::ParseValueError { arg, value }) => {
                assert_eq!(arg, "lengthscale");
                assert_eq!(value, "long");
            }
            other => panic!("expected ParseValueError, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_missing_required() {
        let res = parse_args_from(vec!["vidsummar", "--video-info", "info.tsv"]);
        assert!(matches!(res, Err(AppError::ArgParseError(_))));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(matches!(
            parse(&["--quiet", "--verbose"]),
            Err(AppError::ArgParseError(_))
        ));
    }
}
