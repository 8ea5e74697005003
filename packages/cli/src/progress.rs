//! Logger and spinner setup.
//!
//! `log` output is routed through `indicatif-log-bridge`, so log lines are
//! suspended while a spinner redraws instead of tearing through it.

use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Installs `pretty_env_logger` behind the progress bridge.
///
/// Defaults to `warn` so log lines do not interleave with the menu prompts;
/// `RUST_LOG` raises or narrows it. Returns the [`MultiProgress`] the load
/// spinner is attached to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Warn)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_err()
    {
        log::debug!("Global logger already installed; keeping it");
    }
    log::set_max_level(level);

    multi
}

/// Adds a ticking spinner with `message` to `multi`.
#[must_use]
pub fn spinner(multi: &MultiProgress, message: &str) -> ProgressBar {
    let bar = multi.add(ProgressBar::new_spinner());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_setup_tolerates_repeat_calls() {
        let first = init_logger();
        let second = init_logger();

        let bar = spinner(&second, "Loading incidents");
        assert_eq!(bar.message(), "Loading incidents");
        bar.finish_and_clear();
        drop(first);
    }
}
