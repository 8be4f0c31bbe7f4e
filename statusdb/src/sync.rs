use crate::diff::DiffReport;
use crate::errors::StoreError;
use crate::models::BusinessKey;
use crate::reconcile::{Reconcile, ReconcileOutcome};
use crate::resolver::KeyResolver;
use chrono::NaiveDate;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One source record under consideration in a batch run.
#[derive(Debug, Clone)]
pub struct SyncCandidate<R> {
    pub record: R,
    /// `None` when the record lacks the fields the key is derived from.
    pub key: Option<BusinessKey>,
    /// Completion date of the source record, e.g. the sequencing run date.
    pub completed_on: Option<NaiveDate>,
    /// Human-readable name shown instead of the key, e.g. the project name
    /// of a candidate that is resolved by document id.
    pub label: Option<String>,
}

impl<R> SyncCandidate<R> {
    pub fn new(record: R, key: Option<BusinessKey>, completed_on: Option<NaiveDate>) -> Self {
        Self {
            record,
            key,
            completed_on,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The label, or else the key, for log lines; `<no key>` when neither
    /// is known.
    pub fn key_label(&self) -> String {
        display_key(self.key.as_ref(), self.label.as_deref())
            .unwrap_or_else(|| "<no key>".to_string())
    }
}

fn display_key(key: Option<&BusinessKey>, label: Option<&str>) -> Option<String> {
    label
        .map(str::to_string)
        .or_else(|| key.map(ToString::to_string))
}

/// Selects candidates by the age of their completion date.
///
/// A candidate is admitted while `age < max_age_days`; one exactly
/// `max_age_days` old is already outside the window.
#[derive(Debug, Clone, Copy)]
pub struct AgeWindow {
    max_age_days: Option<i64>,
    today: NaiveDate,
}

impl AgeWindow {
    pub fn unbounded(today: NaiveDate) -> Self {
        Self {
            max_age_days: None,
            today,
        }
    }

    pub fn days(max_age_days: i64, today: NaiveDate) -> Self {
        Self {
            max_age_days: Some(max_age_days),
            today,
        }
    }

    pub fn max_age_days(&self) -> Option<i64> {
        self.max_age_days
    }

    pub fn admits(&self, completed_on: Option<NaiveDate>) -> Result<(), SkipReason> {
        let Some(max_age_days) = self.max_age_days else {
            return Ok(());
        };
        let completed_on = completed_on.ok_or(SkipReason::MissingCompletionDate)?;
        let age_days = (self.today - completed_on).num_days();
        if age_days < max_age_days {
            Ok(())
        } else {
            Err(SkipReason::OutsideWindow { age_days })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    OutsideWindow { age_days: i64 },
    MissingCompletionDate,
    MissingKeyFields,
    NotFound,
    Ambiguous { matches: usize },
    Unchanged,
    CounterpartMissing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OutsideWindow { age_days } => {
                write!(f, "completed {age_days} days ago, outside the age window")
            }
            SkipReason::MissingCompletionDate => f.write_str("no completion date"),
            SkipReason::MissingKeyFields => f.write_str("key fields missing from source record"),
            SkipReason::NotFound => f.write_str("no stored document for key"),
            SkipReason::Ambiguous { matches } => {
                write!(f, "key matches {matches} stored documents")
            }
            SkipReason::Unchanged => f.write_str("stored document already up to date"),
            SkipReason::CounterpartMissing => f.write_str("no counterpart document to compare with"),
        }
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    Updated,
    Compared(DiffReport),
    Skipped(SkipReason),
    Failed(StoreError),
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SyncOutcome::Updated => "updated",
            SyncOutcome::Compared(report) if report.differs() => "diverged",
            SyncOutcome::Compared(_) => "identical",
            SyncOutcome::Skipped(_) => "skipped",
            SyncOutcome::Failed(_) => "failed",
        }
    }

    pub fn detail(&self) -> String {
        match self {
            SyncOutcome::Updated => String::new(),
            SyncOutcome::Compared(report) => format!("{} difference(s)", report.len()),
            SyncOutcome::Skipped(reason) => reason.to_string(),
            SyncOutcome::Failed(err) => format!("{}: {}", err.kind(), err),
        }
    }
}

#[derive(Debug)]
pub struct CandidateReport {
    pub key: Option<BusinessKey>,
    pub label: Option<String>,
    pub outcome: SyncOutcome,
}

impl CandidateReport {
    /// Label or key of the candidate, as recorded in the run catalog.
    pub fn display_key(&self) -> Option<String> {
        display_key(self.key.as_ref(), self.label.as_deref())
    }

    pub fn key_label(&self) -> String {
        self.display_key().unwrap_or_else(|| "<no key>".to_string())
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub batch: String,
    pub reports: Vec<CandidateReport>,
    /// Set when the run stopped early on a cancellation request.
    pub interrupted: bool,
}

impl BatchSummary {
    fn count(&self, pred: impl Fn(&SyncOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    pub fn total(&self) -> usize {
        self.reports.len()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Updated))
    }

    pub fn compared(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Compared(_)))
    }

    pub fn diverged(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Compared(r) if r.differs()))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SyncOutcome::Failed(_)))
    }

    /// Reports for one key, in processing order.
    pub fn for_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a CandidateReport> + 'a {
        self.reports
            .iter()
            .filter(move |r| r.key.as_ref().map(BusinessKey::as_str) == Some(key))
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} candidate(s), {} updated, {} compared ({} diverged), {} skipped, {} failed{}",
            self.batch,
            self.total(),
            self.updated(),
            self.compared(),
            self.diverged(),
            self.skipped(),
            self.failed(),
            if self.interrupted { ", interrupted" } else { "" }
        )
    }
}

/// Cooperative stop request, checked between candidates.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives every per-candidate outcome as it is produced.
pub trait OutcomeReporter: Send + Sync {
    fn report(&self, batch: &str, report: &CandidateReport);
}

/// Writes outcomes to the `log` facade: skips at info, failures at error.
pub struct LogReporter;

impl OutcomeReporter for LogReporter {
    fn report(&self, batch: &str, report: &CandidateReport) {
        let key = report.key_label();
        match &report.outcome {
            SyncOutcome::Updated | SyncOutcome::Compared(_) => {
                log::debug!("{batch} {key}: {}", report.outcome.label());
            }
            SyncOutcome::Skipped(reason) => log::info!("{batch} {key}: skipped, {reason}"),
            SyncOutcome::Failed(err) => log::error!("{batch} {key}: failed, {err}"),
        }
    }
}

/// Walks a candidate set, resolving and reconciling each candidate on its
/// own: one candidate's failure becomes a `Failed` entry and the batch
/// goes on with the next one.
pub struct BatchSynchronizer {
    name: String,
    resolver: Arc<dyn KeyResolver>,
    reporter: Arc<dyn OutcomeReporter>,
    cancel: CancelFlag,
}

impl BatchSynchronizer {
    pub fn new(name: impl Into<String>, resolver: Arc<dyn KeyResolver>) -> Self {
        Self {
            name: name.into(),
            resolver,
            reporter: Arc::new(LogReporter),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn OutcomeReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub async fn run_batch<R, A, I>(
        &self,
        candidates: I,
        window: &AgeWindow,
        action: &A,
    ) -> BatchSummary
    where
        R: Send + Sync,
        A: Reconcile<R> + ?Sized,
        I: IntoIterator<Item = SyncCandidate<R>>,
    {
        log::info!(
            "Starting batch '{}' ({}), age window: {}",
            self.name,
            action.name(),
            window
                .max_age_days()
                .map(|d| format!("{d} days"))
                .unwrap_or_else(|| "unbounded".to_string())
        );

        let mut summary = BatchSummary {
            batch: self.name.clone(),
            ..Default::default()
        };
        for candidate in candidates {
            if self.cancel.is_cancelled() {
                log::warn!("Batch '{}' interrupted, remaining candidates left for the next run", self.name);
                summary.interrupted = true;
                break;
            }
            let outcome = self.process(&candidate, window, action).await;
            let report = CandidateReport {
                key: candidate.key,
                label: candidate.label,
                outcome,
            };
            self.reporter.report(&self.name, &report);
            summary.reports.push(report);
        }

        log::info!("{}", summary);
        summary
    }

    async fn process<R, A>(
        &self,
        candidate: &SyncCandidate<R>,
        window: &AgeWindow,
        action: &A,
    ) -> SyncOutcome
    where
        R: Send + Sync,
        A: Reconcile<R> + ?Sized,
    {
        if let Err(reason) = window.admits(candidate.completed_on) {
            return SyncOutcome::Skipped(reason);
        }
        let Some(key) = candidate.key.as_ref() else {
            return SyncOutcome::Skipped(SkipReason::MissingKeyFields);
        };

        let id = match self.resolver.resolve(key).await {
            Ok(id) => id,
            Err(StoreError::NotFound(_)) => return SyncOutcome::Skipped(SkipReason::NotFound),
            Err(StoreError::AmbiguousKey { matches, .. }) => {
                return SyncOutcome::Skipped(SkipReason::Ambiguous { matches })
            }
            Err(err) => return SyncOutcome::Failed(err),
        };

        match action.reconcile(&id, candidate).await {
            Ok(ReconcileOutcome::Updated) => SyncOutcome::Updated,
            Ok(ReconcileOutcome::Unchanged) => SyncOutcome::Skipped(SkipReason::Unchanged),
            Ok(ReconcileOutcome::Compared(report)) => SyncOutcome::Compared(report),
            Ok(ReconcileOutcome::CounterpartMissing) => {
                SyncOutcome::Skipped(SkipReason::CounterpartMissing)
            }
            Err(err) => SyncOutcome::Failed(err),
        }
    }
}
