use ndarray::Array1;
use std::f64::consts::PI;
use std::sync::mpsc::channel;

use libdetchar::config::{Config, RateConfig};
use libdetchar::process::{process, process_event_rates, process_spectrogram};
use libdetchar::psd::AverageMethod;
use libdetchar::specgram::{
    from_timeseries, from_timeseries_serial, from_timeseries_with_progress, ParallelOptions,
    SpectrogramParams,
};
use libdetchar::timeseries::TimeSeries;
use libdetchar::timeseries_reader::InputFormat;
use libdetchar::units::Unit;
use libdetchar::writer::{read_metadata, sidecar_path};

fn noisy_sine(n: usize, sample_rate: f64) -> Array1<f64> {
    // deterministic pseudo-noise so the median methods have something to chew on
    let mut state: u64 = 12345;
    Array1::from_shape_fn(n, |i| {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let noise = (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5;
        (2.0 * PI * 12.0 * i as f64 / sample_rate).sin() + noise
    })
}

#[test]
fn parallel_matches_serial_for_every_method() {
    let sample_rate = 64.0;
    let series = TimeSeries::new(
        noisy_sine(64 * 200 + 17, sample_rate),
        sample_rate,
        1_200_000_000.0,
        "V".parse().unwrap(),
    );
    for method in [
        AverageMethod::Welch,
        AverageMethod::Bartlett,
        AverageMethod::Median,
        AverageMethod::MedianMean,
    ] {
        let params = SpectrogramParams::new(4.0)
            .with_fftlength(1.0)
            .with_fftstride(0.5)
            .with_method(method);
        let serial = from_timeseries_serial(&series, &params, None, None).unwrap();
        for max_processes in [2, 3, 8] {
            let options = ParallelOptions {
                max_processes,
                min_process_size: 7,
            };
            let parallel = from_timeseries(&series, &params, &options).unwrap();
            assert_eq!(parallel.shape(), (50, 33));
            assert_eq!(parallel.epoch(), serial.epoch());
            assert_eq!(parallel.unit(), serial.unit());
            for (a, b) in parallel.data().iter().zip(serial.data().iter()) {
                assert!((a - b).abs() <= 1e-12 * b.abs().max(1e-30), "{method}: {a} != {b}");
            }
        }
    }
}

#[test]
fn progress_reaches_completion_for_each_partition() {
    let series = TimeSeries::new(noisy_sine(64 * 40, 64.0), 64.0, 0.0, Unit::default());
    let params = SpectrogramParams::new(1.0);
    let options = ParallelOptions {
        max_processes: 3,
        min_process_size: 10,
    };
    let (tx, rx) = channel();
    let spectrogram = from_timeseries_with_progress(&series, &params, &options, Some(tx)).unwrap();
    assert_eq!(spectrogram.n_steps(), 40);
    let mut finished: Vec<usize> = rx
        .iter()
        .filter(|s| s.progress >= 1.0)
        .map(|s| s.partition)
        .collect();
    finished.sort();
    assert_eq!(finished, vec![0, 1, 2, 3]);
}

fn write_inputs(dir: &std::path::Path) -> Config {
    let input_path = dir.join("strain.csv");
    let mut text = String::from("time,strain\n");
    for (i, x) in noisy_sine(32 * 10, 32.0).iter().enumerate() {
        text.push_str(&format!("{},{}\n", i as f64 / 32.0, x));
    }
    std::fs::write(&input_path, text).unwrap();

    let events_path = dir.join("events.csv");
    std::fs::write(
        &events_path,
        "peak,snr\n100.5,6\n101.2,15\n101.9,9\n103.4,30\n104.0,2\n",
    )
    .unwrap();

    Config {
        input_path,
        input_format: InputFormat::Csv,
        column: Some(String::from("strain")),
        sample_rate: 32.0,
        epoch: 100.0,
        unit: String::from("strain"),
        channel: Some(String::from("X1:TEST-STRAIN")),
        output_path: dir.join("specgram.csv"),
        spectrogram: SpectrogramParams::new(2.0).with_fftlength(1.0),
        max_processes: 2,
        min_process_size: 2,
        rates: Some(RateConfig {
            events_path,
            rate_path: dir.join("rates.csv"),
            bin_width: 1.0,
            start: Some(100.0),
            end: Some(104.0),
            timecolumn: None,
            filters: vec![String::from("snr > 5")],
            threshold_column: Some(String::from("snr")),
            thresholds: vec![10.0],
        }),
        ..Default::default()
    }
}

#[test]
fn config_driven_spectrogram_and_rates() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());

    let spectrogram = process_spectrogram(&config, None).unwrap();
    assert_eq!(spectrogram.shape(), (5, 17));
    assert_eq!(spectrogram.channel(), Some("X1:TEST-STRAIN"));
    let metadata = read_metadata(&sidecar_path(&config.output_path)).unwrap();
    assert_eq!(metadata.unit, "strain / Hz");
    assert_eq!(metadata.n_steps, 5);
    let written = std::fs::read_to_string(&config.output_path).unwrap();
    assert_eq!(written.lines().count(), 6);

    let rates = process_event_rates(&config).unwrap();
    assert_eq!(rates.len(), 2);
    assert_eq!(rates[0].0, "all");
    assert_eq!(rates[0].1.data().to_vec(), vec![1.0, 2.0, 0.0, 1.0]);
    assert_eq!(rates[1].0, "snr >= 10");
    assert_eq!(rates[1].1.data().to_vec(), vec![0.0, 1.0, 0.0, 1.0]);
    let written = std::fs::read_to_string(dir.path().join("rates.csv")).unwrap();
    assert_eq!(written.lines().next(), Some("time,all,snr >= 10"));
}

#[test]
fn process_runs_spectrogram_then_rates() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_inputs(dir.path());
    let (tx, rx) = channel();
    let spectrogram = process(&config, Some(tx)).unwrap();
    assert_eq!(spectrogram.shape(), (5, 17));
    assert!(rx.iter().any(|s| s.progress >= 1.0));
    assert!(config.output_path.exists());
    let written = std::fs::read_to_string(dir.path().join("rates.csv")).unwrap();
    assert_eq!(written.lines().count(), 5);

    let without_rates = Config {
        rates: None,
        output_path: dir.path().join("only.csv"),
        ..config
    };
    process(&without_rates, None).unwrap();
    assert!(dir.path().join("only.csv").exists());
}
