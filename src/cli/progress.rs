//! Live progress display for driver runs.
//!
//! Also provides global progress context so summary lines printed while a
//! display is active do not tear the bars.

use std::sync::{OnceLock, RwLock};
use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::scrapers::RunEvent;

/// Global reference to active progress display for coordinating output.
static ACTIVE_PROGRESS: OnceLock<RwLock<Option<MultiProgress>>> = OnceLock::new();

fn get_active_progress() -> &'static RwLock<Option<MultiProgress>> {
    ACTIVE_PROGRESS.get_or_init(|| RwLock::new(None))
}

fn set_active_progress(multi: Option<MultiProgress>) {
    if let Ok(mut guard) = get_active_progress().write() {
        *guard = multi;
    }
}

/// Print a message that coordinates with any active progress display.
/// Falls back to println! if no progress display is active.
pub fn progress_println(message: &str) {
    if let Ok(guard) = get_active_progress().read() {
        if let Some(ref multi) = *guard {
            let _ = multi.println(message);
            return;
        }
    }
    println!("{}", message);
}

fn spinner_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Two spinners: where the crawl is, and what was last saved.
pub struct RunProgress {
    multi: MultiProgress,
    location: ProgressBar,
    documents: ProgressBar,
    saved: usize,
    skipped: usize,
}

impl RunProgress {
    pub fn new(driver: &str) -> Self {
        let multi = MultiProgress::new();

        let location = multi.add(ProgressBar::new_spinner());
        location.set_style(spinner_style("{spinner:.green} {prefix:.bold} {wide_msg}"));
        location.set_prefix(driver.to_string());
        location.set_message("starting");
        location.enable_steady_tick(Duration::from_millis(100));

        let documents = multi.add(ProgressBar::new_spinner());
        documents.set_style(spinner_style("  {spinner:.dim} {wide_msg}"));
        documents.set_message("no documents yet");

        set_active_progress(Some(multi.clone()));

        Self {
            multi,
            location,
            documents,
            saved: 0,
            skipped: 0,
        }
    }

    pub fn handle(&mut self, event: &RunEvent) {
        match event {
            RunEvent::SectionStarted { label } => self.location.set_message(label.clone()),
            RunEvent::PageVisited { url, entries } => {
                self.location
                    .set_message(format!("{} ({} entries)", url, entries));
            }
            RunEvent::Saved {
                title, new_document, ..
            } => {
                self.saved += 1;
                let mark = if *new_document { "saved" } else { "present" };
                self.documents.set_message(format!(
                    "{} saved, {} skipped | {} {}",
                    self.saved,
                    self.skipped,
                    mark,
                    truncate_title(title, 60)
                ));
                self.documents.tick();
            }
            RunEvent::Skipped { url, kind, .. } => {
                self.skipped += 1;
                let _ = self.multi.println(format!(
                    "  {} {} {}",
                    style("!").yellow(),
                    style(kind).dim(),
                    url
                ));
            }
        }
    }

    /// Clear the display and unregister it.
    pub fn finish(&self) {
        self.location.finish_and_clear();
        self.documents.finish_and_clear();
        set_active_progress(None);
    }
}

/// Consume run events until the sender side is dropped.
pub fn spawn_listener(
    driver: &str,
    show: bool,
    mut events: mpsc::Receiver<RunEvent>,
) -> JoinHandle<()> {
    let driver = driver.to_string();
    tokio::spawn(async move {
        let mut progress = show.then(|| RunProgress::new(&driver));
        while let Some(event) = events.recv().await {
            if let Some(ref mut progress) = progress {
                progress.handle(&event);
            }
        }
        if let Some(progress) = progress {
            progress.finish();
        }
    })
}

/// Shorten a title for display, on a character boundary.
fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}
