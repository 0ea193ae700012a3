//! Strided PSD spectrograms of a [TimeSeries].
//!
//! [from_timeseries_serial] computes one PSD per stride on the calling thread.
//! [from_timeseries] optionally splits the strides into contiguous partitions, hands
//! them to a fixed pool of worker threads and joins the partial spectrograms back
//! together in time order.
use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::error::SpectrogramError;
use super::fft_plan::FftPlan;
use super::psd::{average_psd, AverageMethod};
use super::spectrogram::{Spectrogram, SpectrogramList};
use super::timeseries::TimeSeries;
use super::units::spectral_density_unit;
use super::window::Window;
use super::worker_status::WorkerStatus;

/// Progress messages are sent roughly this many times per partition
const PROGRESS_UPDATES: usize = 100;

/// FFT parameters of a spectrogram. All durations are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrogramParams {
    /// Duration covered by one row of the spectrogram
    pub stride: f64,
    /// Duration of one FFT; defaults to `stride`
    pub fftlength: Option<f64>,
    /// Time between the starts of consecutive FFTs; defaults to `fftlength`
    pub fftstride: Option<f64>,
    #[serde(default)]
    pub method: AverageMethod,
    #[serde(default)]
    pub window: Window,
}

impl SpectrogramParams {
    pub fn new(stride: f64) -> Self {
        Self {
            stride,
            fftlength: None,
            fftstride: None,
            method: AverageMethod::default(),
            window: Window::default(),
        }
    }

    pub fn with_fftlength(mut self, fftlength: f64) -> Self {
        self.fftlength = Some(fftlength);
        self
    }

    pub fn with_fftstride(mut self, fftstride: f64) -> Self {
        self.fftstride = Some(fftstride);
        self
    }

    pub fn with_method(mut self, method: AverageMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_window(mut self, window: Window) -> Self {
        self.window = window;
        self
    }

    pub fn fftlength(&self) -> f64 {
        self.fftlength.unwrap_or(self.stride)
    }

    pub fn fftstride(&self) -> f64 {
        self.fftstride.unwrap_or_else(|| self.fftlength())
    }
}

/// How to fan a spectrogram out over worker threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelOptions {
    /// Size of the worker pool; 1 computes everything on the calling thread
    pub max_processes: usize,
    /// Minimum number of strides given to one partition
    pub min_process_size: usize,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            max_processes: 1,
            min_process_size: 500,
        }
    }
}

/// Sample counts derived from the parameters and the series sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepLayout {
    pub stride_samples: usize,
    pub n_steps: usize,
    pub nfft: usize,
    pub n_frequencies: usize,
}

fn positive(name: &'static str, value: f64) -> Result<f64, SpectrogramError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(SpectrogramError::BadParameter(name, value))
    }
}

fn to_samples(name: &'static str, duration: f64, sample_rate: f64) -> Result<usize, SpectrogramError> {
    let samples = (positive(name, duration)? * sample_rate).round();
    if samples < 1.0 {
        Err(SpectrogramError::BelowOneSample(name, duration))
    } else {
        Ok(samples as usize)
    }
}

/// Work out the number of strides and frequency bins of a spectrogram of `series`
pub fn step_layout(
    series: &TimeSeries,
    params: &SpectrogramParams,
) -> Result<StepLayout, SpectrogramError> {
    let sample_rate = positive("sample_rate", series.sample_rate())?;
    let stride_samples = to_samples("stride", params.stride, sample_rate)?;
    let nfft = to_samples("fftlength", params.fftlength(), sample_rate)?;
    to_samples("fftstride", params.fftstride(), sample_rate)?;
    Ok(StepLayout {
        stride_samples,
        n_steps: series.len() / stride_samples,
        nfft,
        n_frequencies: nfft / 2 + 1,
    })
}

/// Where a worker reports progress, if anywhere
struct ProgressSink<'a> {
    tx: &'a Sender<WorkerStatus>,
    partition: usize,
    worker_id: usize,
}

impl ProgressSink<'_> {
    fn send(&self, progress: f32) -> Result<(), SpectrogramError> {
        self.tx
            .send(WorkerStatus::new(progress, self.partition, self.worker_id))?;
        Ok(())
    }
}

fn build(
    series: &TimeSeries,
    params: &SpectrogramParams,
    window: Option<&Array1<f64>>,
    plan: Option<&FftPlan>,
    progress: Option<ProgressSink<'_>>,
) -> Result<Spectrogram, SpectrogramError> {
    let layout = step_layout(series, params)?;
    let fftlength = params.fftlength();
    let unit = spectral_density_unit(series.unit()).into_unit();

    // Axes follow the rounded sample counts, not the requested durations
    let sample_rate = series.sample_rate();
    let mut out = Spectrogram::zeros(
        (layout.n_steps, layout.n_frequencies),
        series.epoch(),
        layout.stride_samples as f64 / sample_rate,
        0.0,
        sample_rate / layout.nfft as f64,
        unit,
    )
    .with_channel(series.channel());
    if layout.n_steps == 0 {
        log::debug!(
            "Series of {} samples is shorter than one stride of {} samples",
            series.len(),
            layout.stride_samples
        );
        return Ok(out);
    }
    if layout.nfft > layout.stride_samples {
        return Err(SpectrogramError::FftLongerThanStride(fftlength, params.stride));
    }

    let generated_window;
    let window = match window {
        Some(w) => w,
        None => {
            generated_window = params.window.generate(layout.nfft);
            &generated_window
        }
    };
    let generated_plan;
    let plan = match plan {
        Some(p) => p,
        None => {
            generated_plan = FftPlan::new(layout.nfft)?;
            &generated_plan
        }
    };

    let nstride = (params.fftstride() * sample_rate).round() as usize;
    let report_every = (layout.n_steps / PROGRESS_UPDATES).max(1);
    for step in 0..layout.n_steps {
        let start = step * layout.stride_samples;
        let psd = average_psd(
            series.data().slice(s![start..start + layout.stride_samples]),
            sample_rate,
            layout.nfft,
            nstride,
            params.method,
            Some(window),
            Some(plan),
        )?;
        out.set_row(step, &psd);

        if let Some(sink) = &progress {
            if (step + 1) % report_every == 0 && step + 1 < layout.n_steps {
                sink.send((step + 1) as f32 / layout.n_steps as f32)?;
            }
        }
    }
    if let Some(sink) = &progress {
        sink.send(1.0)?;
    }

    Ok(out)
}

/// Compute a spectrogram on the calling thread.
///
/// Row `i` is the PSD of the samples `[i * stride, (i + 1) * stride)`; samples after the
/// last full stride are ignored. A series shorter than one stride gives an empty
/// spectrogram with the usual metadata. `window` and `plan`, when given, must match the
/// FFT length and are reused for every row; otherwise they are created here.
pub fn from_timeseries_serial(
    series: &TimeSeries,
    params: &SpectrogramParams,
    window: Option<&Array1<f64>>,
    plan: Option<&FftPlan>,
) -> Result<Spectrogram, SpectrogramError> {
    build(series, params, window, plan, None)
}

/// Compute a spectrogram, fanning out over worker threads when `options` allow it.
pub fn from_timeseries(
    series: &TimeSeries,
    params: &SpectrogramParams,
    options: &ParallelOptions,
) -> Result<Spectrogram, SpectrogramError> {
    from_timeseries_with_progress(series, params, options, None)
}

/// Divide a set of partitions among workers, round-robin
pub fn create_subsets(n_partitions: usize, n_workers: usize) -> Vec<Vec<usize>> {
    let mut subsets: Vec<Vec<usize>> = vec![Vec::new(); n_workers.max(1)];
    let n_subsets = subsets.len();
    for partition in 0..n_partitions {
        subsets[partition % n_subsets].push(partition)
    }
    subsets
}

/// Contiguous sample ranges handed to workers, each covering `steps_per_proc` strides.
///
/// The last range is clipped to the series and ranges that start past the last full
/// stride are not produced at all.
pub fn partition_ranges(
    layout: &StepLayout,
    options: &ParallelOptions,
    series_len: usize,
) -> Vec<std::ops::Range<usize>> {
    let n_proc = (layout.n_steps / options.min_process_size.max(1)).max(1);
    let steps_per_proc = layout.n_steps.div_ceil(n_proc);
    let samples_per_proc = steps_per_proc * layout.stride_samples;
    (0..n_proc)
        .map(|k| k * samples_per_proc..((k + 1) * samples_per_proc).min(series_len))
        .filter(|range| range.start / layout.stride_samples < layout.n_steps)
        .collect()
}

type PartialResult = (usize, Result<Spectrogram, SpectrogramError>);

/// Same as [from_timeseries], additionally sending [WorkerStatus] updates on `progress`.
///
/// Every worker is joined before returning. The first error from any partition, a
/// panicked worker or a missing partition fails the whole spectrogram.
pub fn from_timeseries_with_progress(
    series: &TimeSeries,
    params: &SpectrogramParams,
    options: &ParallelOptions,
    progress: Option<Sender<WorkerStatus>>,
) -> Result<Spectrogram, SpectrogramError> {
    let layout = step_layout(series, params)?;
    if options.max_processes <= 1 || layout.n_steps == 0 {
        let sink = progress.as_ref().map(|tx| ProgressSink {
            tx,
            partition: 0,
            worker_id: 0,
        });
        return build(series, params, None, None, sink);
    }

    let ranges = partition_ranges(&layout, options, series.len());
    let window = Arc::new(params.window.generate(layout.nfft));
    let plan = FftPlan::new(layout.nfft)?;
    let subsets = create_subsets(ranges.len(), options.max_processes.min(ranges.len()));
    log::info!(
        "Computing {} strides in {} partitions on {} workers",
        layout.n_steps,
        ranges.len(),
        subsets.len()
    );

    let (tx, rx) = mpsc::sync_channel::<PartialResult>(options.max_processes);
    let mut workers: Vec<(usize, JoinHandle<()>)> = Vec::with_capacity(subsets.len());
    let mut spawn_error = None;
    for (worker_id, subset) in subsets.into_iter().enumerate() {
        let partitions: Vec<(usize, TimeSeries)> = subset
            .into_iter()
            .map(|p| (p, series.slice(ranges[p].clone())))
            .collect();
        let tx = tx.clone();
        let progress = progress.clone();
        let params = params.clone();
        let window = Arc::clone(&window);
        let plan = plan.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("specgram-{worker_id}"))
            .spawn(move || {
                for (partition, part) in partitions {
                    let sink = progress.as_ref().map(|status_tx| ProgressSink {
                        tx: status_tx,
                        partition,
                        worker_id,
                    });
                    let result = build(&part, &params, Some(window.as_ref()), Some(&plan), sink);
                    if tx.send((partition, result)).is_err() {
                        break;
                    }
                }
            });
        match spawned {
            Ok(handle) => workers.push((worker_id, handle)),
            Err(e) => {
                spawn_error = Some(e);
                break;
            }
        }
    }
    // Only the workers hold senders now, so the receiver ends once they all have
    drop(tx);

    let mut results: Vec<Option<Result<Spectrogram, SpectrogramError>>> =
        (0..ranges.len()).map(|_| None).collect();
    for (partition, result) in rx {
        results[partition] = Some(result);
    }

    let mut panicked = None;
    for (worker_id, handle) in workers {
        if handle.join().is_err() {
            log::error!("Spectrogram worker {worker_id} panicked");
            panicked.get_or_insert(worker_id);
        }
    }
    if let Some(e) = spawn_error {
        return Err(SpectrogramError::SpawnFailed(e));
    }
    if let Some(worker_id) = panicked {
        return Err(SpectrogramError::WorkerPanicked(worker_id));
    }

    let mut partials = SpectrogramList::new();
    for (partition, result) in results.into_iter().enumerate() {
        match result {
            Some(r) => partials.push(r?),
            None => return Err(SpectrogramError::MissingPartition(partition)),
        }
    }
    partials.sort_by_epoch();
    let out = partials.join()?;
    log::debug!(
        "Joined spectrogram of shape {:?} ({})",
        out.shape(),
        human_bytes::human_bytes(out.nbytes() as f64)
    );
    Ok(out)
}
