// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use super::ProgressReporter;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

const BYTES_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] \
                              {bytes}/{total_bytes} {msg} ({bytes_per_sec}, {eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bytes} {msg}";

/// Byte progress bar drawn on stderr while an artifact downloads.
pub struct IndicatifProgressReporter {
    progress_bar: Option<ProgressBar>,
    context: String,
    hidden: bool,
}

impl IndicatifProgressReporter {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            progress_bar: None,
            context: context.into(),
            hidden: false,
        }
    }

    /// Reporter that tracks progress without drawing anything.
    pub fn hidden(context: impl Into<String>) -> Self {
        let mut reporter = Self::new(context);
        reporter.hidden = true;
        reporter
    }

    fn template(total_bytes: u64) -> &'static str {
        if total_bytes > 0 {
            BYTES_TEMPLATE
        } else {
            SPINNER_TEMPLATE
        }
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn on_start(&mut self, total_bytes: u64) {
        let pb = if total_bytes > 0 {
            ProgressBar::new(total_bytes)
        } else {
            ProgressBar::new_spinner()
        };
        if self.hidden {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        }

        match ProgressStyle::default_bar().template(Self::template(total_bytes)) {
            Ok(style) => pb.set_style(
                style
                    .progress_chars("█▓░")
                    .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷"),
            ),
            Err(e) => log::debug!("Falling back to default progress style: {e}"),
        }

        pb.set_message(format!("Downloading {}", self.context));
        pb.enable_steady_tick(Duration::from_millis(100));
        self.progress_bar = Some(pb);
    }

    fn on_progress(&mut self, bytes_downloaded: u64) {
        if let Some(pb) = &self.progress_bar {
            pb.set_position(bytes_downloaded);
        }
    }

    fn on_complete(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.finish_with_message(format!("Downloaded {}", self.context));
        }
    }
}

impl Drop for IndicatifProgressReporter {
    fn drop(&mut self) {
        if let Some(pb) = self.progress_bar.take() {
            pb.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_selection() {
        assert!(IndicatifProgressReporter::template(1024).contains("{total_bytes}"));
        assert!(!IndicatifProgressReporter::template(0).contains("{bar:"));
    }

    #[test]
    fn test_progress_lifecycle_with_total() {
        let mut reporter = IndicatifProgressReporter::hidden("mupen64plus 2.6.0");
        reporter.on_start(1024 * 1024);
        reporter.on_progress(512 * 1024);
        assert_eq!(
            reporter.progress_bar.as_ref().map(|pb| pb.position()),
            Some(512 * 1024)
        );
        reporter.on_complete();
        assert!(reporter.progress_bar.is_none());
    }

    #[test]
    fn test_hidden_reporter_keeps_context() {
        let reporter = IndicatifProgressReporter::hidden("mupen64plus 2.6.0");
        assert!(reporter.hidden);
        assert_eq!(reporter.context, "mupen64plus 2.6.0");
        assert!(reporter.progress_bar.is_none());
        assert!(!IndicatifProgressReporter::new("bundle.zip").hidden);
    }

    #[test]
    fn test_progress_without_total() {
        let mut reporter = IndicatifProgressReporter::hidden("bundle.zip");
        reporter.on_start(0);
        for i in 1..=10 {
            reporter.on_progress(i * 100);
        }
        reporter.on_complete();
    }

    #[test]
    fn test_progress_reporter_trait_impl() {
        fn accepts_reporter(_reporter: Box<dyn ProgressReporter>) {}
        accepts_reporter(Box::new(IndicatifProgressReporter::new("bundle.zip")));
    }
}
