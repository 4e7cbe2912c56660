use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use indicatif::{ProgressBar, ProgressStyle};
use photoseries_core::{Progress, Stage};

/// Terminal progress bars, one per running stage.
#[derive(Default)]
pub struct BarProgress {
    bars: Mutex<HashMap<Stage, ProgressBar>>,
}

impl BarProgress {
    fn with_bar(&self, stage: Stage, f: impl FnOnce(&ProgressBar)) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bar) = bars.get(&stage) {
            f(bar);
        }
    }
}

fn style(stage: Stage) -> ProgressStyle {
    let template = match stage {
        Stage::Thumbnails => "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        Stage::Upload => "[{elapsed_precise}] {bar:40.green/blue} {pos}/{len} {msg}",
        Stage::Delete => "[{elapsed_precise}] {bar:40.red/blue} {pos}/{len} {msg}",
    };
    ProgressStyle::default_bar()
        .template(template)
        .expect("Invalid progress bar template")
        .progress_chars("█▓▒░ ")
}

impl Progress for BarProgress {
    fn start(&self, stage: Stage, total: u64) {
        let bar = ProgressBar::new(total);
        bar.set_style(style(stage));
        bar.set_message(format!("{}...", stage.label()));

        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = bars.insert(stage, bar) {
            previous.finish_and_clear();
        }
    }

    fn advance(&self, stage: Stage, item: &str) {
        self.with_bar(stage, |bar| {
            bar.inc(1);
            bar.set_message(format!("{}: {}", stage.label(), item));
        });
    }

    fn finish(&self, stage: Stage) {
        let bar = self
            .bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&stage);
        if let Some(bar) = bar {
            bar.finish_with_message(format!("{} complete", stage.label()));
        }
    }
}
