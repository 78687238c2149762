/// The step a worker is currently running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Stage {
    #[default]
    Analyze,
    Headers,
    Export,
    Project,
}

#[derive(Debug, Clone, Default)]
pub struct WorkerStatus {
    pub progress: f32,
    pub stage: Stage,
    pub worker_id: usize,
}

impl WorkerStatus {
    pub fn new(progress: f32, stage: Stage, worker_id: usize) -> Self {
        Self {
            progress,
            stage,
            worker_id,
        }
    }
}
