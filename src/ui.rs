//! Console progress for the monitoring binary.
//!
//! Stages get a spinner on a TTY and a plain `==>` line otherwise. The frame
//! loop gets a bar sized to the container's frame count, or a counter when the
//! count is unknown.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(value: &str) -> Self {
        match value {
            "plain" => UiMode::Plain,
            "pretty" => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let pretty = is_tty && mode != UiMode::Plain;
        Self { pretty }
    }

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

    /// Progress over the frame loop. Hidden in plain mode.
    pub fn frames(&self, frame_count: u64) -> ProgressBar {
        if !self.pretty {
            return ProgressBar::hidden();
        }
        let (bar, template) = if frame_count > 0 {
            (
                ProgressBar::new(frame_count),
                "{bar:40} {pos}/{len} frames ({per_sec}) {msg}",
            )
        } else {
            (ProgressBar::new_spinner(), "{spinner} {pos} frames ({per_sec}) {msg}")
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_draws() {
        let ui = Ui::new(UiMode::Plain, true);
        assert!(ui.frames(10).is_hidden());
        assert!(Ui::new(UiMode::Pretty, false).frames(10).is_hidden());
    }

    #[test]
    fn unknown_modes_fall_back_to_auto() {
        assert_eq!(UiMode::parse("fancy"), UiMode::Auto);
        assert_eq!(UiMode::parse("plain"), UiMode::Plain);
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1_500)), "1.50s");
    }
}
