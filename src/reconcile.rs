//! Desired-state planning for access logging configurations.
//!
//! Both subcommands share the same shape of work: observe the logging
//! state currently attached to a resource, compare it to the desired
//! target under normalized prefixes, and plan a change only when the
//! two differ. This module holds that shared logic, along with the
//! per-resource error stages and the end-of-run summary.
use std::fmt::{self, Display, Formatter};

use crate::types::UtilResult;

/// Normalizes a log prefix to end with a single trailing separator.
///
/// An empty prefix stays empty, meaning logs are delivered at the root
/// of the target bucket. Normalization is idempotent, so values can be
/// passed back through without stacking separators.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');

    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

/// A bucket/prefix pair that access logs should be delivered to.
///
/// The prefix is normalized on construction, so two targets which only
/// differ by a trailing separator compare as equal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LoggingTarget {
    pub bucket: String,
    pub prefix: String,
}

impl LoggingTarget {
    /// Constructs a new `LoggingTarget` with a normalized prefix.
    pub fn new<B, P>(bucket: B, prefix: P) -> Self
    where
        B: Into<String>,
        P: AsRef<str>,
    {
        Self {
            bucket: bucket.into(),
            prefix: normalize_prefix(prefix.as_ref()),
        }
    }
}

/// Display implementation to render a target as an S3 location.
impl Display for LoggingTarget {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}

/// The change required to bring a resource to its desired state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Action {
    /// Logging is currently disabled and needs to be switched on.
    Enable,
    /// Logging is enabled but delivers to the wrong location.
    Update,
    /// The observed state already matches the desired state.
    NoOp,
}

impl Action {
    /// Determines whether this action results in a write call.
    pub fn requires_write(self) -> bool {
        self != Action::NoOp
    }
}

/// A planned change for a single resource.
///
/// Records are transient; they only live for the duration of a single
/// reconcile/apply pass over one resource.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChangeRecord {
    pub resource: String,
    pub action: Action,
    pub before: Option<LoggingTarget>,
    pub after: LoggingTarget,
}

impl ChangeRecord {
    /// Plans a change by comparing observed state against the desired target.
    ///
    /// Comparison happens on normalized targets, so a prefix missing a
    /// trailing separator never triggers a spurious update.
    pub fn plan<R>(resource: R, before: Option<LoggingTarget>, after: LoggingTarget) -> Self
    where
        R: Into<String>,
    {
        let action = match &before {
            None => Action::Enable,
            Some(current) if *current == after => Action::NoOp,
            Some(_) => Action::Update,
        };

        Self {
            resource: resource.into(),
            action,
            before,
            after,
        }
    }

    /// Resolves the outcome of this record ahead of any write call.
    ///
    /// Matching state resolves as a no-op and dry-run resolves pending
    /// changes as previews, in both cases with no write at all. A `None`
    /// means the write call must be issued, and its result decides the
    /// outcome.
    pub fn preflight(&self, dryrun: bool) -> Option<Outcome> {
        if !self.action.requires_write() {
            return Some(Outcome::NoOp);
        }

        if dryrun {
            return Some(Outcome::Preview);
        }

        None
    }
}

/// Per-resource errors attributed to the stage which raised them.
///
/// Stage errors for a single resource are logged and counted rather
/// than propagated, so one broken resource never halts the rest of
/// the batch. Enumeration errors are the exception; with no listing
/// there is no batch, so they surface as fatal.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StageError {
    /// The resource listing call or input file could not be read.
    Enumeration(String),
    /// The resource is missing, or its logging state could not be read.
    Lookup(String),
    /// The write call to change the logging state was rejected.
    Apply(String),
}

/// Display implementation tagging messages with their failed stage.
impl Display for StageError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            StageError::Enumeration(msg) => write!(f, "unable to list resources: {}", msg),
            StageError::Lookup(msg) => write!(f, "unable to read logging state: {}", msg),
            StageError::Apply(msg) => write!(f, "unable to apply logging change: {}", msg),
        }
    }
}

/// The terminal state of a single resource in a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// The write call went through and logging is now configured.
    Applied,
    /// The resource was already configured; nothing was written.
    NoOp,
    /// Dry-run mode; the change was reported but not written.
    Preview,
    /// The resource failed during lookup or apply.
    Failed,
}

/// Running counts of resource outcomes, reported at the end of a run.
#[derive(Debug, Default, Eq, PartialEq)]
pub struct Summary {
    applied: usize,
    noop: usize,
    previewed: usize,
    failed: usize,
}

impl Summary {
    /// Records the outcome of a single resource.
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Applied => self.applied += 1,
            Outcome::NoOp => self.noop += 1,
            Outcome::Preview => self.previewed += 1,
            Outcome::Failed => self.failed += 1,
        }
    }

    /// Logs out all counters using a common format.
    pub fn print(&self) {
        info!("");
        info!("[summary]");
        info!("applied={}", self.applied);
        info!("no-op={}", self.noop);
        info!("previewed={}", self.previewed);
        info!("failed={}", self.failed);
    }

    /// Converts the summary into the overall process result.
    ///
    /// Any failed resource makes the whole run fail, which bubbles up
    /// as a non-zero exit status from the binary.
    pub fn finish(&self) -> UtilResult<()> {
        if self.failed > 0 {
            Err(format!("{} resource(s) failed during processing", self.failed).into())
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizing_prefixes() {
        assert_eq!(normalize_prefix("lb"), "lb/");
        assert_eq!(normalize_prefix("lb/"), "lb/");
        assert_eq!(normalize_prefix("lb//"), "lb/");
        assert_eq!(normalize_prefix("a/b/c"), "a/b/c/");
        assert_eq!(normalize_prefix(""), "");
    }

    #[test]
    fn normalizing_is_idempotent() {
        for prefix in &["", "lb", "lb/", "a/b//", "access-logs/app"] {
            let once = normalize_prefix(prefix);
            let twice = normalize_prefix(&once);

            assert_eq!(once, twice);
        }
    }

    #[test]
    fn planning_an_enable() {
        let desired = LoggingTarget::new("logs", "lb/");
        let record = ChangeRecord::plan("lb-1", None, desired.clone());

        assert_eq!(record.action, Action::Enable);
        assert_eq!(record.before, None);
        assert_eq!(record.after, desired);
        assert!(record.action.requires_write());
    }

    #[test]
    fn planning_an_update() {
        let observed = LoggingTarget::new("old-logs", "lb/");
        let desired = LoggingTarget::new("logs", "lb/");
        let record = ChangeRecord::plan("lb-1", Some(observed), desired);

        assert_eq!(record.action, Action::Update);
        assert!(record.action.requires_write());
    }

    #[test]
    fn planning_a_noop() {
        let observed = LoggingTarget::new("logs", "lb");
        let desired = LoggingTarget::new("logs", "lb/");
        let record = ChangeRecord::plan("lb-1", Some(observed), desired);

        assert_eq!(record.action, Action::NoOp);
        assert!(!record.action.requires_write());
    }

    #[test]
    fn resolving_matching_state() {
        let observed = LoggingTarget::new("logs", "lb");
        let desired = LoggingTarget::new("logs", "lb/");
        let record = ChangeRecord::plan("lb-1", Some(observed), desired);

        // matching state never reaches the write call, in either mode
        assert_eq!(record.preflight(false), Some(Outcome::NoOp));
        assert_eq!(record.preflight(true), Some(Outcome::NoOp));
    }

    #[test]
    fn resolving_dry_runs() {
        let desired = LoggingTarget::new("logs", "lb/");
        let observed = LoggingTarget::new("old-logs", "lb/");

        let enable = ChangeRecord::plan("lb-1", None, desired.clone());
        let update = ChangeRecord::plan("lb-2", Some(observed), desired);

        // dry-run resolves pending changes as previews with no write
        assert_eq!(enable.preflight(true), Some(Outcome::Preview));
        assert_eq!(update.preflight(true), Some(Outcome::Preview));

        // a live run leaves the outcome to the write call
        assert_eq!(enable.preflight(false), None);
        assert_eq!(update.preflight(false), None);
    }

    #[test]
    fn labelling_stage_errors() {
        let listing = StageError::Enumeration("expired token".into());
        let lookup = StageError::Lookup("no such bucket".into());
        let apply = StageError::Apply("access denied".into());

        assert_eq!(
            listing.to_string(),
            "unable to list resources: expired token"
        );
        assert_eq!(
            lookup.to_string(),
            "unable to read logging state: no such bucket"
        );
        assert_eq!(
            apply.to_string(),
            "unable to apply logging change: access denied"
        );
    }

    #[test]
    fn rendering_targets() {
        let rooted = LoggingTarget::new("logs", "");
        let nested = LoggingTarget::new("logs", "lb/app");

        assert_eq!(rooted.to_string(), "s3://logs/");
        assert_eq!(nested.to_string(), "s3://logs/lb/app/");
    }

    #[test]
    fn summarizing_outcomes() {
        let mut summary = Summary::default();

        summary.record(Outcome::Applied);
        summary.record(Outcome::NoOp);
        summary.record(Outcome::NoOp);
        summary.record(Outcome::Preview);

        assert!(summary.finish().is_ok());

        summary.record(Outcome::Failed);

        let result = summary.finish();
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "1 resource(s) failed during processing"
        );
    }

    #[test]
    fn isolating_failed_resources() {
        let results: Vec<Result<Outcome, StageError>> = vec![
            Ok(Outcome::Applied),
            Err(StageError::Apply("write rejected".into())),
            Ok(Outcome::Applied),
        ];

        // the same trapping shape as the subcommand loops
        let mut summary = Summary::default();
        for result in results {
            match result {
                Ok(outcome) => summary.record(outcome),
                Err(_) => summary.record(Outcome::Failed),
            }
        }

        // the resource after the failure was still recorded
        assert_eq!(
            summary,
            Summary {
                applied: 2,
                noop: 0,
                previewed: 0,
                failed: 1,
            }
        );
        assert!(summary.finish().is_err());
    }
}
