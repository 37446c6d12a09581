//! Progress counters rendered on stderr
//!
//! Stages only increment atomics; the reporter only reads them on a timer.

use dataplug_format::{Counter, Counters};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Glyph and colour of one counter line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterStyle {
    /// Symbol printed before the counter name
    pub glyph: &'static str,
    /// indicatif colour name
    pub color: &'static str,
}

impl CounterStyle {
    /// Records evaluated by a validator
    pub const EVALUATED: Self = Self {
        glyph: "?",
        color: "yellow",
    };
    /// Records that passed
    pub const VALID: Self = Self {
        glyph: "✓",
        color: "green",
    };
    /// Records that failed
    pub const INVALID: Self = Self {
        glyph: "✗",
        color: "red",
    };
    /// Records moved through a tap
    pub const FLOW: Self = Self {
        glyph: "↑",
        color: "green",
    };

    fn template(&self) -> String {
        format!("{{prefix:.{}}} {{msg}}: {{pos}}", self.color)
    }
}

impl Default for CounterStyle {
    fn default() -> Self {
        Self::FLOW
    }
}

/// Periodic renderer of a set of counters
pub struct ProgressReporter {
    bars: Vec<(ProgressBar, Counter)>,
    stop: CancellationToken,
    ticker: JoinHandle<()>,
}

impl ProgressReporter {
    /// Draw one line per counter and refresh them every `interval`
    ///
    /// `styles` is matched to `counters` by position; missing entries use the
    /// default style.
    pub fn start(
        counters: &Counters,
        styles: &[CounterStyle],
        target: ProgressDrawTarget,
        interval: Duration,
    ) -> Self {
        let multi = MultiProgress::with_draw_target(target);
        let bars: Vec<(ProgressBar, Counter)> = counters
            .iter()
            .enumerate()
            .map(|(position, (name, counter))| {
                let style = styles.get(position).copied().unwrap_or_default();
                let bar = multi.add(ProgressBar::new_spinner());
                bar.set_style(
                    ProgressStyle::with_template(&style.template())
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                bar.set_prefix(style.glyph);
                bar.set_message(name.to_string());
                (bar, counter.clone())
            })
            .collect();

        let stop = CancellationToken::new();
        let ticker = {
            let bars = bars.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                let mut timer = tokio::time::interval(interval);
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        _ = timer.tick() => render(&bars),
                    }
                }
            })
        };

        Self { bars, stop, ticker }
    }

    /// Stop the timer and draw the final values
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(err) = self.ticker.await {
            debug!(error = %err, "Progress ticker ended abnormally");
        }
        render(&self.bars);
        for (bar, _) in &self.bars {
            bar.finish();
        }
    }

    /// Number of rendered counters
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// True when no counter is rendered
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

fn render(bars: &[(ProgressBar, Counter)]) {
    for (bar, counter) in bars {
        bar.set_position(counter.get());
    }
}
