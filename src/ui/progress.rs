//! Spinners and the precache progress bar

use super::context::UiContext;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner for a single long step, plain lines in CI
pub struct TaskSpinner {
    spinner: Option<cliclack::ProgressBar>,
    interactive: bool,
}

impl TaskSpinner {
    pub fn new(ctx: &UiContext) -> Self {
        Self {
            spinner: None,
            interactive: ctx.use_fancy_output(),
        }
    }

    pub fn start(&mut self, message: &str) {
        if self.interactive {
            let spinner = cliclack::spinner();
            spinner.start(message);
            self.spinner = Some(spinner);
        } else {
            println!("{} {}", style("...").dim(), message);
        }
    }

    pub fn stop(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.stop(message),
            None => println!("{} {}", style("[OK]").green(), message),
        }
    }

    pub fn stop_error(&mut self, message: &str) {
        match self.spinner.take() {
            Some(spinner) => spinner.error(message),
            None => println!("{} {}", style("[FAIL]").red(), message),
        }
    }
}

/// Progress while the static asset list is fetched.
///
/// An `indicatif` bar on a terminal, one line per asset otherwise. Safe to
/// tick from the concurrent asset fetches.
pub struct PrecacheProgress {
    bar: Option<ProgressBar>,
}

impl PrecacheProgress {
    pub fn new(ctx: &UiContext, total: usize, generation: &str) -> Self {
        let bar = if ctx.use_fancy_output() {
            let bar = ProgressBar::new(total as u64);
            if let Ok(template) = ProgressStyle::default_bar().template(
                "  {spinner:.cyan} Precaching {prefix}  {bar:20.cyan/dim} {pos}/{len} {msg:.dim}",
            ) {
                bar.set_style(
                    template
                        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                        .progress_chars("━╸─"),
                );
            }
            bar.set_prefix(generation.to_string());
            bar.enable_steady_tick(Duration::from_millis(120));
            Some(bar)
        } else {
            println!("Precaching {} assets into {}...", total, generation);
            None
        };
        Self { bar }
    }

    /// One asset fetched
    pub fn on_asset(&self, asset: &str) {
        match &self.bar {
            Some(bar) => {
                bar.inc(1);
                bar.set_message(shorten(asset, 48));
            }
            None => println!("  fetched {}", asset),
        }
    }

    pub fn finish(&self) {
        if let Some(bar) = &self.bar {
            bar.disable_steady_tick();
            bar.finish_and_clear();
        }
    }
}

/// Keep the tail of long paths, which is the part that identifies the file
fn shorten(path: &str, max: usize) -> String {
    let count = path.chars().count();
    if count <= max {
        return path.to_string();
    }
    let tail: String = path.chars().skip(count - (max - 3)).collect();
    format!("...{}", tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_non_interactive() {
        let ctx = UiContext::non_interactive();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start("Activating...");
        spinner.stop("Activated");
    }

    #[test]
    fn precache_progress_non_interactive() {
        let ctx = UiContext::non_interactive();
        let progress = PrecacheProgress::new(&ctx, 2, "site-static-v1");
        progress.on_asset("/index.html");
        progress.on_asset("/styles.css");
        progress.finish();
    }

    #[test]
    fn shorten_keeps_tail() {
        assert_eq!(shorten("/a.css", 10), "/a.css");
        let long = "/EAD-web/Logo simple Taller (snf blanco).png";
        let short = shorten(long, 20);
        assert_eq!(short.chars().count(), 20);
        assert!(short.starts_with("..."));
        assert!(short.ends_with("blanco).png"));
    }
}
