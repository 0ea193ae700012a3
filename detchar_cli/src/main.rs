use clap::{Arg, ArgMatches, Command};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use indicatif_log_bridge::LogWrapper;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;

use libdetchar::channel::ChannelList;
use libdetchar::cis::{CisClient, DEFAULT_CIS_URL};
use libdetchar::clf::{read_channel_list_file, write_channel_list};
use libdetchar::config::Config;
use libdetchar::omega::{read_scan_config, write_scan_config, ScanConfig};
use libdetchar::process::{process, process_event_rates};
use libdetchar::worker_status::WorkerStatus;

fn make_template_config(path: &Path) {
    match Config::default().write_config_file(path) {
        Ok(()) => log::info!("Done."),
        Err(e) => log::error!("Could not create template config file: {e}"),
    }
}

fn load_config(path: &Path) -> Option<Config> {
    log::info!("Loading config from {}...", path.to_string_lossy());
    match Config::read_config_file(path) {
        Ok(c) => {
            log::info!("Config successfully loaded.");
            Some(c)
        }
        Err(e) => {
            log::error!("{e}");
            None
        }
    }
}

/// Omega scan configurations are recognized by extension; everything else is read as a CLF
fn is_omega_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("txt") | Some("cfg") | Some("omega")
    )
}

fn run_spectrogram(config: Config, pb_manager: &MultiProgress) {
    log::info!("Input Path: {}", config.input_path.to_string_lossy());
    log::info!("Output Path: {}", config.output_path.to_string_lossy());
    log::info!(
        "Sample Rate: {} Hz Epoch: {} Unit: {}",
        config.sample_rate,
        config.epoch,
        config.unit
    );
    log::info!(
        "Stride: {} s FFT Length: {} s FFT Stride: {} s Method: {} Window: {}",
        config.spectrogram.stride,
        config.spectrogram.fftlength(),
        config.spectrogram.fftstride(),
        config.spectrogram.method,
        config.spectrogram.window
    );
    log::info!("Max Processes: {}", config.max_processes);

    let style = ProgressStyle::with_template("{prefix} [{bar:40}] {pos}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let mut bars: BTreeMap<usize, (ProgressBar, usize)> = BTreeMap::new();

    // Spawn the task!
    let (tx, rx) = channel::<WorkerStatus>();
    let handle = std::thread::spawn(move || process(&config, Some(tx)));

    // The channel closes once the task and all of its workers are done
    for status in rx {
        let (bar, partition) = bars.entry(status.worker_id).or_insert_with(|| {
            let bar = pb_manager.add(ProgressBar::new(100));
            bar.set_style(style.clone());
            bar.set_prefix(format!("Worker {}", status.worker_id));
            (bar, usize::MAX)
        });
        if *partition != status.partition {
            *partition = status.partition;
            bar.set_message(format!("partition {}", status.partition));
        }
        bar.set_position((status.progress * 100.0) as u64);
    }
    for (bar, _) in bars.values() {
        bar.finish();
    }

    match handle.join() {
        Ok(Ok(spectrogram)) => log::info!(
            "Successfully built spectrogram of shape {:?}!",
            spectrogram.shape()
        ),
        Ok(Err(e)) => log::error!("Processing failed with error: {e}"),
        Err(_) => log::error!("Failed to join processing task!"),
    }
}

fn run_rates(config: Config) {
    match process_event_rates(&config) {
        Ok(rates) => log::info!("Successfully computed {} event rate series!", rates.len()),
        Err(e) => log::error!("Event rates failed with error: {e}"),
    }
}

fn run_channels(input: Option<&PathBuf>, args: &ArgMatches) {
    let channels: ChannelList = if let Some(name) = args.get_one::<String>("query") {
        let url = args
            .get_one::<String>("cis-url")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CIS_URL);
        let result = CisClient::new(url).and_then(|client| client.query(name));
        match result {
            Ok(c) => c,
            Err(e) => {
                log::error!("{e}");
                return;
            }
        }
    } else if let Some(path) = input {
        let result = if is_omega_file(path) {
            read_scan_config(path)
                .and_then(|c| c.to_channel_list())
                .map_err(|e| e.to_string())
        } else {
            read_channel_list_file(path).map_err(|e| e.to_string())
        };
        match result {
            Ok(c) => c,
            Err(e) => {
                log::error!("{e}");
                return;
            }
        }
    } else {
        log::error!("The channels command requires either --path or --query");
        return;
    };
    log::info!("Found {} channels.", channels.len());

    match args.get_one::<String>("output").map(PathBuf::from) {
        Some(output) => {
            let written = File::create(&output)
                .map_err(|e| e.to_string())
                .and_then(|mut file| {
                    if is_omega_file(&output) {
                        write_scan_config(&ScanConfig::from_channel_list(&channels), &mut file)
                            .map_err(|e| e.to_string())
                    } else {
                        write_channel_list(&channels, &mut file).map_err(|e| e.to_string())
                    }
                });
            match written {
                Ok(()) => log::info!("Wrote channels to {}", output.to_string_lossy()),
                Err(e) => log::error!("Could not write channels: {e}"),
            }
        }
        None => match serde_yaml::to_string(&channels) {
            Ok(yaml) => println!("{yaml}"),
            Err(e) => log::error!("{e}"),
        },
    }
}

fn main() {
    // Create a cli
    let matches = Command::new("detchar_cli")
        .arg_required_else_help(true)
        .subcommand(Command::new("new").about("Make a template configuration yaml file"))
        .subcommand(
            Command::new("spectrogram")
                .about("Build the spectrogram (and event rates, if configured) from a config file"),
        )
        .subcommand(Command::new("rate").about("Compute the event rates described by a config file"))
        .subcommand(
            Command::new("channels")
                .about("Read, query or convert channel lists")
                .arg(
                    Arg::new("query")
                        .short('q')
                        .long("query")
                        .help("Query the Channel Information System for this name"),
                )
                .arg(
                    Arg::new("cis-url")
                        .long("cis-url")
                        .help("Base URL of the Channel Information System API"),
                )
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help("Write the channels to this CLF or Omega file"),
                ),
        )
        .arg(
            Arg::new("path")
                .short('p')
                .long("path")
                .global(true)
                .help("Path to the file"),
        )
        .get_matches();

    // Initialize feedback
    let logger = simplelog::TermLogger::new(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );

    let pb_manager = MultiProgress::new();

    if let Err(e) = LogWrapper::new(pb_manager.clone(), logger).try_init() {
        eprintln!("Could not create logging/progress: {e}");
        return;
    }

    // Parse the cli
    let path = matches.get_one::<String>("path").map(PathBuf::from);

    match matches.subcommand() {
        Some(("channels", args)) => run_channels(path.as_ref(), args),
        Some((command, _)) => {
            let Some(config_path) = path else {
                log::error!("The {command} command requires --path");
                return;
            };
            match command {
                "new" => {
                    log::info!(
                        "Making a template config at {}...",
                        config_path.to_string_lossy()
                    );
                    make_template_config(&config_path);
                }
                "spectrogram" => {
                    if let Some(config) = load_config(&config_path) {
                        run_spectrogram(config, &pb_manager);
                    }
                }
                "rate" => {
                    if let Some(config) = load_config(&config_path) {
                        run_rates(config);
                    }
                }
                _ => log::error!("Unrecognized command {command}"),
            }
        }
        None => log::error!("No command given"),
    }

    log::info!("Done.");
}
