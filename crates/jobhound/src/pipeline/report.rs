use serde::Serialize;

/// Counters for one pipeline run. Serialized to JSON by the CLI.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Posts the source returned.
    pub scraped: u64,
    /// New posts stored after the duplicate filter.
    pub ingested: u64,
    /// Posts dropped as duplicates of stored ones.
    pub duplicates: u64,
    /// Posts the triage stage finished.
    pub triaged: u64,
    /// Vacancies extracted by triage.
    pub vacancies_found: u64,
    /// Vacancies rated by the evaluation stage.
    pub evaluated: u64,
    /// Resumes generated and rendered.
    pub resumes_generated: u64,
    /// Application emails actually sent.
    pub emails_sent: u64,
    /// Telegram notifications sent.
    pub telegram_sent: u64,
    /// Recipients skipped by the anti-spam window.
    pub skipped_antispam: u64,
    /// Per-item failures that did not abort the run.
    pub failures: Vec<String>,
    /// True when a stop request cut the run short.
    pub stopped: bool,
}

impl RunReport {
    pub(crate) fn note_failure(&mut self, what: impl Into<String>) {
        self.failures.push(what.into());
    }
}
