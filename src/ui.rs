//! Terminal feedback for the interactive binary: stage spinners and the run summary.
//!
//! Spinners are drawn on stderr only when it is a terminal; otherwise each stage
//! prints a plain `==> stage` line. Pipeline progress itself goes through `log`.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::pipeline::{RunReport, Termination};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum UiMode {
    #[default]
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode) -> Self {
        Self::with_terminal(mode, std::io::stderr().is_terminal())
    }

    pub fn with_terminal(mode: UiMode, is_tty: bool) -> Self {
        let pretty = is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => std::env::var_os("NO_COLOR").is_none(),
                UiMode::Plain => false,
            };
        Self { pretty }
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }

    /// Start a stage; it is reported as finished when the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        if self.pretty {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner))
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None)
        }
    }

    pub fn summary(&self, report: &RunReport) {
        let outcome = match report.termination {
            Termination::Stopped => "stopped by user",
            Termination::EndOfStream => "end of video",
            Termination::Error => "error",
        };
        eprintln!(
            "Run finished ({}) on {} after {}",
            outcome,
            report.device,
            format_duration(report.elapsed)
        );
        eprintln!(
            "  frames read: {}, processed: {}, detections: {}",
            report.frames_read, report.frames_processed, report.detections_rendered
        );
        if report.inference_failures > 0 {
            eprintln!("  skipped after inference failure: {}", report.inference_failures);
        }
        if let Some(rate) = report.last_rate {
            eprintln!("  processing rate: {:.1} fps", rate);
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    failed: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            failed: false,
        }
    }

    /// Finish the stage as failed instead of done.
    pub fn fail(mut self) {
        self.failed = true;
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let mark = if self.failed { "✘" } else { "✔" };
        let message = format!(
            "{} {} ({})",
            mark,
            self.name,
            format_duration(self.start.elapsed())
        );
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
