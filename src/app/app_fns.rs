use std::{
    collections::HashSet,
    error::Error,
    io::BufWriter,
    path::Path,
};

use rusttype::Font;
use serde::Serialize;

use crate::{
    app::*,
    library::{load_videos, RbfKernel, Video, VideoRecord},
};

pub fn run_app() -> i32 {
    //Parse arguments and bail early if there is an error.
    let cfg = match parse_args() {
        Ok(cfg) => {
            configure_logs(cfg.output_cfg.verbosity);
            cfg
        }
        Err(fatal) => {
            //The logger is configured from the arguments, so it is not running yet if they
            //failed to parse. Start it before reporting the error.
            configure_logs(ReportVerbosity::Verbose);
            print_fatal_err(&fatal, ReportVerbosity::Verbose);
            return 1;
        }
    };

    match run_app_inner(&cfg) {
        Ok(nonfatal_errs) => {
            print_nonfatal_errs(nonfatal_errs);
            0
        }
        Err(fatal_error) => {
            print_fatal_err(&fatal_error, cfg.output_cfg.verbosity);
            1
        }
    }
}

pub fn run_app_inner(cfg: &AppCfg) -> Result<Vec<AppError>, AppError> {
    let mut nonfatal_errs: Vec<AppError> = vec![];

    let font = match &cfg.output_cfg.font_path {
        Some(font_path) => Some(load_font(font_path)?),
        None => None,
    };

    if let Some(plot_dir) = &cfg.output_cfg.plot_dir {
        std::fs::create_dir_all(plot_dir).map_err(|e| AppError::PlotDirError(plot_dir.to_path_buf(), e))?;
    }

    let (videos, load_errs) = load_videos(&cfg.load_cfg)?;
    nonfatal_errs.extend(load_errs.into_iter().map(AppError::from));

    let mut videos = select_videos(videos, &cfg.video_ids, &mut nonfatal_errs);

    //sanity check: the user may have given the wrong files or ids.
    if videos.is_empty() {
        warn!("No videos were found in both the video info and annotation files. Nothing to do.")
    }

    for video in videos.iter_mut() {
        if let Err(e) = process_video(video, cfg, font.as_ref()) {
            nonfatal_errs.push(e);
        }
    }

    print_videos(&videos, cfg.output_cfg.json_output);

    Ok(nonfatal_errs)
}

fn load_font(font_path: &Path) -> Result<Font<'static>, AppError> {
    let bytes = std::fs::read(font_path).map_err(|e| AppError::FontNotFoundError(font_path.to_path_buf(), e))?;
    Font::try_from_vec(bytes).ok_or_else(|| AppError::FontParseError(font_path.to_path_buf()))
}

//keep only the videos the user asked for, reporting any ids that were asked for but not loaded.
fn select_videos(videos: Vec<Video>, video_ids: &[String], nonfatal_errs: &mut Vec<AppError>) -> Vec<Video> {
    if video_ids.is_empty() {
        return videos;
    }

    let wanted = video_ids.iter().map(String::as_str).collect::<HashSet<_>>();
    let loaded = videos.iter().map(Video::id).collect::<HashSet<_>>();

    let mut missing = wanted.difference(&loaded).map(|id| id.to_string()).collect::<Vec<_>>();
    missing.sort();
    nonfatal_errs.extend(missing.into_iter().map(AppError::UnknownVideoId));

    videos.into_iter().filter(|video| wanted.contains(video.id())).collect()
}

fn process_video(video: &mut Video, cfg: &AppCfg, font: Option<&Font>) -> Result<(), AppError> {
    let plot_cfg = &cfg.plot_cfg;
    let plot_dir = cfg.output_cfg.plot_dir.as_ref();

    if let Some(plot_dir) = plot_dir {
        video.plot_samples(plot_dir.join(format!("{}_samples.png", video.id())), plot_cfg, font)?;
    }

    if !cfg.fit {
        return Ok(());
    }

    video.fit_gaussian_process(&cfg.gp_cfg)?;

    match plot_dir {
        Some(plot_dir) => {
            video.plot_gaussian_process(plot_dir.join(format!("{}_gp.png", video.id())), plot_cfg, font)?;
            //also stores the per-frame predictions.
            let predictions_path = plot_dir.join(format!("{}_predictions.png", video.id()));
            video.plot_predictions(predictions_path, plot_cfg, font)?;
        }
        None => {
            video.predict_frames()?;
        }
    }

    info!(target: "fit", "Fitted and predicted video {}", video.id());
    Ok(())
}

#[derive(Serialize)]
struct JsonFit {
    kernel: RbfKernel,
    noise_variance: f64,
    log_likelihood: f64,
    mean: Vec<f64>,
    variance: Vec<f64>,
}

#[derive(Serialize)]
struct JsonVideo<'a> {
    #[serde(flatten)]
    record: &'a VideoRecord,
    annotators: usize,
    samples: &'a [Vec<i64>],
    fit: Option<JsonFit>,
}

impl<'a> From<&'a Video> for JsonVideo<'a> {
    fn from(video: &'a Video) -> Self {
        let fit = video.gp().map(|gp| JsonFit {
            kernel: gp.kernel(),
            noise_variance: gp.noise_variance(),
            log_likelihood: gp.log_marginal_likelihood(),
            mean: video.gp_mu().map(|mu| mu.to_vec()).unwrap_or_default(),
            variance: video.gp_var().map(|var| var.to_vec()).unwrap_or_default(),
        });

        Self {
            record: video.record(),
            annotators: video.ratings().len(),
            samples: video.samples(),
            fit,
        }
    }
}

fn print_videos(videos: &[Video], json_output: bool) {
    if json_output {
        let output_vec = videos.iter().map(JsonVideo::from).collect::<Vec<_>>();

        let stdout = BufWriter::new(std::io::stdout());
        serde_json::to_writer_pretty(stdout, &output_vec).unwrap_or_default();
        println!();
    } else {
        for video in videos {
            println!("{}", video);
            println!("Annotators: {}", video.ratings().len());
            if let Some(gp) = video.gp() {
                println!("Log Likelihood: {:.3}", gp.log_marginal_likelihood());
            }
            if let Some(mu) = video.gp_mu() {
                println!("Predicted Frames: {}", mu.len());
            }
            println!();
        }
    }
}

fn print_fatal_err(fatal_err: &AppError, verbosity: ReportVerbosity) {
    error!(target: "app-errorlog", "{}", fatal_err);

    if verbosity == ReportVerbosity::Verbose {
        let mut source: Option<&(dyn Error + 'static)> = fatal_err.source();
        while let Some(e) = source {
            error!(target: "app-errorlog", "    caused by: {}", e);
            source = e.source();
        }
    }
}

fn print_nonfatal_errs(nonfatal_errs: Vec<AppError>) {
    for err in nonfatal_errs {
        warn!("{}", err);

        let mut source = err.source();
        while let Some(e) = source {
            warn!("    caused by: {}", e);
            source = e.source();
        }
    }
}

pub fn configure_logs(verbosity: ReportVerbosity) {
    use simplelog::*;

    let mut cfg = simplelog::ConfigBuilder::new();
    cfg.set_thread_level(LevelFilter::Off);

    let min_loglevel = match verbosity {
        ReportVerbosity::Quiet => LevelFilter::Warn,
        ReportVerbosity::Default => LevelFilter::Info,
        ReportVerbosity::Verbose => LevelFilter::Trace,
    };

    TermLogger::init(
        min_loglevel,
        cfg.build(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )
    .expect("TermLogger failed to initialize");
}

#[cfg(test)]
mod tests {
    use std::{fs, path::PathBuf};

    use super::*;
    use crate::library::{definitions::DEFAULT_GP, LoadCfg, PlotCfg, ShortRowPolicy};

    fn write_inputs(dir: &Path) -> LoadCfg {
        let video_info_path = dir.join("info.tsv");
        let annotations_path = dir.join("anno.tsv");

        let rise = (0..240).map(|i| (1 + i / 60).to_string()).collect::<Vec<_>>().join(",");
        let flat = vec!["2"; 240].join(",");

        fs::write(
            &video_info_path,
            "genre\tid\ttitle\turl\tduration\nVT\tv1\tOne\thttp://1\t0:08\nVT\tv2\tTwo\thttp://2\t0:08\n",
        )
        .unwrap();
        fs::write(
            &annotations_path,
            format!(
                "id\tgenre\tratings\nv1\tVT\t{rise}\nv1\tVT\t{flat}\nv2\tVT\t{flat}\n",
                rise = rise,
                flat = flat
            ),
        )
        .unwrap();

        LoadCfg {
            video_info_path,
            annotations_path,
            short_rows: ShortRowPolicy::Stop,
        }
    }

    fn app_cfg(load_cfg: LoadCfg, plot_dir: Option<PathBuf>) -> AppCfg {
        AppCfg {
            load_cfg,
            gp_cfg: DEFAULT_GP,
            plot_cfg: PlotCfg {
                width: 320,
                height: 240,
                n_boot: 5,
                seed: 0,
            },
            output_cfg: OutputCfg {
                json_output: true,
                plot_dir,
                font_path: None,
                verbosity: ReportVerbosity::Quiet,
            },
            video_ids: vec![],
            fit: true,
        }
    }

    #[test]
    fn test_run_writes_plots() {
        let dir = tempfile::tempdir().unwrap();
        let plot_dir = dir.path().join("plots");
        let cfg = app_cfg(write_inputs(dir.path()), Some(plot_dir.clone()));

        let errs = run_app_inner(&cfg).unwrap();
        assert!(errs.is_empty(), "{:?}", errs);

        for id in &["v1", "v2"] {
            for kind in &["samples", "gp", "predictions"] {
                assert!(plot_dir.join(format!("{}_{}.png", id, kind)).is_file());
            }
        }
    }

    #[test]
    fn test_run_reports_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = app_cfg(write_inputs(dir.path()), None);
        cfg.video_ids = vec!["v2".to_string(), "nope".to_string()];

        let errs = run_app_inner(&cfg).unwrap();
        assert!(matches!(errs.as_slice(), [AppError::UnknownVideoId(id)] if id == "nope"));
    }

    #[test]
    fn test_run_missing_font() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = app_cfg(write_inputs(dir.path()), None);
        cfg.output_cfg.font_path = Some(dir.path().join("missing.ttf"));

        assert!(matches!(run_app_inner(&cfg), Err(AppError::FontNotFoundError(..))));
    }

    #[test]
    fn test_run_unparseable_font() {
        let dir = tempfile::tempdir().unwrap();
        let font_path = dir.path().join("junk.ttf");
        fs::write(&font_path, b"not a font").unwrap();

        let mut cfg = app_cfg(write_inputs(dir.path()), None);
        cfg.output_cfg.font_path = Some(font_path);

        assert!(matches!(run_app_inner(&cfg), Err(AppError::FontParseError(_))));
    }

    #[test]
    fn test_run_fit_errors_are_nonfatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = app_cfg(write_inputs(dir.path()), None);
        cfg.gp_cfg.lengthscale = 0.0;

        let errs = run_app_inner(&cfg).unwrap();
        assert_eq!(errs.len(), 2);
        assert!(errs.iter().all(|e| matches!(e, AppError::VideoError(_))));
    }

    #[test]
    fn test_json_video() {
        let dir = tempfile::tempdir().unwrap();
        let load_cfg = write_inputs(dir.path());
        let (mut videos, _) = load_videos(&load_cfg).unwrap();

        let unfitted = serde_json::to_value(JsonVideo::from(&videos[0])).unwrap();
        assert_eq!(unfitted["id"], "v1");
        assert_eq!(unfitted["duration"], 8);
        assert_eq!(unfitted["annotators"], 2);
        assert_eq!(unfitted["samples"][0], serde_json::json!([1, 2, 3, 4]));
        assert!(unfitted["fit"].is_null());

        videos[0].fit_gaussian_process(&DEFAULT_GP).unwrap();
        videos[0].predict_frames().unwrap();
        let fitted = serde_json::to_value(JsonVideo::from(&videos[0])).unwrap();
        assert_eq!(fitted["fit"]["kernel"]["lengthscale"], 60.0);
        assert_eq!(fitted["fit"]["mean"].as_array().unwrap().len(), 180);
    }
}
