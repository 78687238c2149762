use clap::{Arg, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use libprovus_formatter::config::Config;
use libprovus_formatter::process::{process, Action, ProcessSummary};
use libprovus_formatter::worker_status::WorkerStatus;

const LOG_FILE_NAME: &str = "provus_formatter.log";

fn make_template_config(path: &Path) -> Result<(), String> {
    let config = Config::default();
    let yaml_str = serde_yaml::to_string(&config).map_err(|e| e.to_string())?;
    let mut file = File::create(path).map_err(|e| e.to_string())?;
    file.write_all(yaml_str.as_bytes())
        .map_err(|e| e.to_string())?;
    Ok(())
}

fn log_summary(summary: &ProcessSummary) {
    log::info!(
        "Files: {} ({} with detected parameters)",
        summary.files,
        summary.resolved
    );
    if summary.headers_written + summary.header_failures > 0 {
        log::info!(
            "Headers written: {} Failed: {}",
            summary.headers_written,
            summary.header_failures
        );
    }
    if summary.exported + summary.export_failures > 0 {
        log::info!(
            "Definitions exported: {} Failed: {}",
            summary.exported,
            summary.export_failures
        );
    }
    if let Some(manifest) = &summary.manifest {
        log::info!(
            "Project file {} {:?} ({} assignment(s))",
            manifest.path.display(),
            manifest.status,
            manifest.records
        );
    }
    if summary.header_failures + summary.export_failures > 0 {
        log::warn!("Some files failed. Check {LOG_FILE_NAME} for details.");
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("provus_formatter_cli")
        .about("Prepare TEM/PEM survey data for import into Provus")
        .arg_required_else_help(true)
        .subcommand_required(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("analyze").about("Detect file parameters and show the assignments"),
        )
        .subcommand(Command::new("catalog").about("List the available waveforms and schemes"))
        .subcommand(Command::new("headers").about("Write assignments into data file headers"))
        .subcommand(Command::new("export").about("Write the referenced waveform/scheme CSVs"))
        .subcommand(Command::new("project").about("Create or update the Provus project file"))
        .subcommand(Command::new("all").about("Run headers, export and project"))
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .required(true)
                .help("Path to the configuration file"),
        )
        .get_matches();

    // Initialize feedback
    let term_logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    let mut loggers: Vec<Box<dyn simplelog::SharedLogger>> = vec![term_logger];
    match File::create(LOG_FILE_NAME) {
        Ok(file) => loggers.push(simplelog::WriteLogger::new(
            simplelog::LevelFilter::Info,
            simplelog::Config::default(),
            file,
        )),
        Err(e) => eprintln!("Could not create log file {LOG_FILE_NAME}: {e}"),
    }
    let logger = simplelog::CombinedLogger::new(loggers);

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }
    log::set_max_level(log::LevelFilter::Info);

    // Parse the cli
    let Some(config_path) = matches.get_one::<String>("path").map(PathBuf::from) else {
        log::error!("A configuration path is required");
        return;
    };

    let action = match matches.subcommand() {
        Some(("new", _)) => {
            log::info!(
                "Making a template config at {}...",
                config_path.to_string_lossy()
            );
            match make_template_config(&config_path) {
                Ok(()) => log::info!("Done."),
                Err(e) => log::error!("Could not write template config: {e}"),
            }
            return;
        }
        Some(("analyze", _)) => Action::Analyze,
        Some(("catalog", _)) => Action::Catalog,
        Some(("headers", _)) => Action::Headers,
        Some(("export", _)) => Action::Export,
        Some(("project", _)) => Action::Project,
        Some(("all", _)) => Action::All,
        _ => {
            log::error!("Unknown subcommand");
            return;
        }
    };

    // Load our config
    log::info!("Loading config from {}...", config_path.to_string_lossy());
    let config = match Config::read_config_file(&config_path) {
        Ok(c) => c,
        Err(e) => {
            log::error!("{e}");
            return;
        }
    };
    if !config.is_n_threads_valid() {
        log::error!("n_threads must be at least 1, found {}", config.n_threads);
        return;
    }
    log::info!("Config successfully loaded.");
    log::info!("Root Path: {}", config.root_path.to_string_lossy());
    log::info!("Project Name: {}", config.project_name);
    log::info!("Number of Workers: {}", config.n_threads);

    // Setup the progress bar
    let pb = pb_manager.add(ProgressBar::new(100));
    if let Ok(style) = ProgressStyle::with_template("{prefix:>8} [{bar:40.cyan/blue}] {pos:>3}%") {
        pb.set_style(style.progress_chars("=> "));
    }
    let (tx, rx) = channel::<WorkerStatus>();
    // Spawn the task!
    let handle = std::thread::spawn(move || process(config, action, tx, 0));

    loop {
        std::thread::sleep(std::time::Duration::from_millis(200));
        for status in rx.try_iter() {
            pb.set_prefix(format!("{:?}", status.stage));
            pb.set_position((status.progress * 100.0) as u64);
        }

        if handle.is_finished() {
            match handle.join() {
                Ok(result) => match result {
                    Ok(summary) => {
                        pb.finish();
                        log_summary(&summary);
                    }
                    Err(e) => {
                        pb.abandon();
                        log::error!("Processing failed with error: {e}");
                    }
                },
                Err(_) => log::error!("Failed to join processing task!"),
            }
            break;
        }
    }

    log::info!("Done.");
}
