//! Progress reporting for long-running stages.

/// Stages that report per-item progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Thumbnails,
    Upload,
    Delete,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Thumbnails => "Processing images",
            Stage::Upload => "Uploading",
            Stage::Delete => "Deleting",
        }
    }
}

/// Receives progress from worker threads and upload tasks.
pub trait Progress: Send + Sync {
    fn start(&self, stage: Stage, total: u64);
    fn advance(&self, stage: Stage, item: &str);
    fn finish(&self, stage: Stage);
}

/// Discards all progress.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Progress for Silent {
    fn start(&self, _stage: Stage, _total: u64) {}
    fn advance(&self, _stage: Stage, _item: &str) {}
    fn finish(&self, _stage: Stage) {}
}
