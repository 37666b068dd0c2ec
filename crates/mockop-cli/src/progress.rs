//! Verbose generation progress using indicatif.

use indicatif::{ProgressBar, ProgressStyle};
use mockop::generator::{GenerationObserver, QueryDefinition};
use std::io::Write;

/// Observer that shows one spinner per query on stderr.
pub struct VerboseProgress {
    spinner: Option<ProgressBar>,
    total: usize,
    index: usize,
}

impl VerboseProgress {
    pub fn new(total: usize) -> Self {
        Self {
            spinner: None,
            total,
            index: 0,
        }
    }

    fn finish_spinner(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

impl GenerationObserver for VerboseProgress {
    fn query_started(&mut self, query: &QueryDefinition) {
        self.finish_spinner();
        self.index += 1;
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!(
            "[{}/{}] {} ({})",
            self.index,
            self.total,
            query.name,
            query.kind.type_name()
        ));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        self.spinner = Some(pb);
    }

    fn record_saved(&mut self, name: &str) {
        match self.spinner.as_ref() {
            Some(pb) => pb.println(format!("  \x1b[32m✓\x1b[0m {name}")),
            None => {
                let _ = writeln!(std::io::stderr(), "  \x1b[32m✓\x1b[0m {name}");
            }
        }
    }

    fn query_skipped(&mut self, query: &QueryDefinition) {
        self.finish_spinner();
        self.index += 1;
        let _ = writeln!(
            std::io::stderr(),
            "  \x1b[33m-\x1b[0m {} (disabled)",
            query.name
        );
    }
}

impl Drop for VerboseProgress {
    fn drop(&mut self) {
        self.finish_spinner();
    }
}
