/// Progress message sent by a spectrogram worker to whoever is watching.
#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub partition: usize,
    pub worker_id: usize,
}

impl WorkerStatus {
    pub fn new(progress: f32, partition: usize, worker_id: usize) -> Self {
        Self {
            progress,
            partition,
            worker_id,
        }
    }
}
