//! Enable access logging for S3 buckets, listed or discovered.
//!
//! Buckets are either named explicitly in an input file (one name per
//! line) or discovered via `--scan`, which walks every bucket in the
//! account and reports the ones missing a logging configuration,
//! grouped by their home region. File mode reconciles each bucket
//! against a per-bucket prefix inside the target bucket and writes the
//! configuration for any bucket which differs.
use clap::{App, Arg, ArgMatches, SubCommand};
use rusoto_s3::*;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::cli;
use crate::reconcile::{Action, ChangeRecord, LoggingTarget, Outcome, StageError, Summary};
use crate::types::{self, UtilResult};

/// Generates an appropriate `SubCommand` for this module.
pub fn cmd<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("s3")
        .about("Enable access logging for S3 buckets")
        .args(&cli::global_args())
        .args(&[
            Arg::with_name("file")
                .help("A file containing one bucket name per line")
                .short("f")
                .long("file")
                .takes_value(true)
                .required_unless("scan")
                .conflicts_with("scan"),
            Arg::with_name("target")
                .help("An S3 bucket to deliver access logs into")
                .short("t")
                .long("target-bucket")
                .takes_value(true)
                .required_unless("scan"),
            Arg::with_name("scan")
                .help("Scan the region for buckets missing access logging")
                .short("s")
                .long("scan"),
        ])
}

/// Executes this subcommand and returns a `UtilResult` to indicate success.
pub async fn exec(s3: S3Client, args: &ArgMatches<'_>) -> UtilResult<()> {
    // scan mode only audits, it never writes
    if args.is_present("scan") {
        return scan(&s3).await;
    }

    // parse all global arguments
    let dryrun = cli::is_dry_run(args);

    // both are enforced by clap whenever scan is absent
    let target = args.value_of("target").unwrap();
    let names = read_bucket_names(args.value_of("file").unwrap())?;

    info!("Found {} bucket(s). Processing...", names.len());

    let mut summary = Summary::default();

    // reconcile every listed bucket, trapping per-bucket failures
    for name in names {
        // each bucket delivers under its own prefix in the target
        let desired = LoggingTarget::new(target, format!("access-logs/{}", name));

        match process(&s3, &name, desired, dryrun).await {
            Ok(outcome) => summary.record(outcome),
            Err(err) => {
                error!("Skipping {}: {}", name, err);
                summary.record(Outcome::Failed);
            }
        }
    }

    summary.print();
    summary.finish()
}

/// Reconciles a single bucket and applies any required change.
async fn process(
    s3: &S3Client,
    name: &str,
    desired: LoggingTarget,
    dryrun: bool,
) -> Result<Outcome, StageError> {
    // one read call to observe the current state
    let observed = fetch_logging(s3, name).await?;
    let record = ChangeRecord::plan(name, observed, desired);

    // resolve anything which doesn't reach the write call
    let resolved = record.preflight(dryrun);

    // matching state means no write at all
    if resolved == Some(Outcome::NoOp) {
        info!("{} already delivers to {}", name, record.after);
        return Ok(Outcome::NoOp);
    }

    // log out exactly what we're changing right now
    let verb = match record.action {
        Action::Enable => "Enabling",
        _ => "Updating",
    };
    info!("{} access logs for {} -> {}", verb, name, record.after);

    // dry-run only reports
    if let Some(outcome) = resolved {
        return Ok(outcome);
    }

    apply(s3, &record).await?;
    Ok(Outcome::Applied)
}

/// Fetches the currently observed logging target of a bucket.
async fn fetch_logging(s3: &S3Client, name: &str) -> Result<Option<LoggingTarget>, StageError> {
    let request = GetBucketLoggingRequest {
        bucket: name.to_string(),
    };

    let response = s3
        .get_bucket_logging(request)
        .await
        .map_err(|err| StageError::Lookup(types::error_message(err)))?;

    Ok(logging_from_status(response.logging_enabled))
}

/// Issues the write call to point a bucket at the planned target.
async fn apply(s3: &S3Client, record: &ChangeRecord) -> Result<(), StageError> {
    let request = PutBucketLoggingRequest {
        bucket: record.resource.clone(),
        bucket_logging_status: BucketLoggingStatus {
            logging_enabled: Some(LoggingEnabled {
                target_bucket: record.after.bucket.clone(),
                target_prefix: record.after.prefix.clone(),
                target_grants: None,
            }),
        },
        ..PutBucketLoggingRequest::default()
    };

    s3.put_bucket_logging(request)
        .await
        .map_err(|err| StageError::Apply(types::error_message(err)))?;

    Ok(())
}

/// Scans every bucket in the account for missing logging configuration.
///
/// Nothing is written in this mode; buckets without logging are grouped
/// by their home region and printed, followed by the overall counts.
async fn scan(s3: &S3Client) -> UtilResult<()> {
    info!("Scanning buckets for missing access logging...");

    let response = s3
        .list_buckets()
        .await
        .map_err(|err| StageError::Enumeration(types::error_message(err)))?;
    let buckets = response.buckets.unwrap_or_default();

    let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut configured = 0;
    let mut failed = 0;

    for bucket in buckets {
        // names should always be present on listed buckets
        let name = match bucket.name {
            Some(name) => name,
            None => continue,
        };

        // any logging target at all counts as configured
        match fetch_logging(s3, &name).await {
            Ok(Some(_)) => configured += 1,
            Ok(None) => match bucket_region(s3, &name).await {
                Ok(region) => missing.entry(region).or_default().push(name),
                Err(err) => {
                    error!("Skipping {}: {}", name, err);
                    failed += 1;
                }
            },
            Err(err) => {
                error!("Skipping {}: {}", name, err);
                failed += 1;
            }
        }
    }

    // print the missing buckets grouped per region
    for (region, names) in &missing {
        info!("");
        info!("[{}]", region);
        for name in names {
            info!("  - {}", name);
        }
    }

    let count: usize = missing.values().map(|names| names.len()).sum();

    info!("");
    info!("[summary]");
    info!("missing={}", count);
    info!("configured={}", configured);
    info!("failed={}", failed);

    if failed > 0 {
        return Err(format!("{} bucket(s) failed during scan", failed).into());
    }

    Ok(())
}

/// Fetches the home region of a bucket.
async fn bucket_region(s3: &S3Client, name: &str) -> Result<String, StageError> {
    let request = GetBucketLocationRequest {
        bucket: name.to_string(),
    };

    let response = s3
        .get_bucket_location(request)
        .await
        .map_err(|err| StageError::Lookup(types::error_message(err)))?;

    // an empty location constraint is us-east-1 in disguise
    Ok(match response.location_constraint {
        Some(region) if !region.is_empty() => region,
        _ => "us-east-1".to_string(),
    })
}

/// Converts a raw bucket logging status into an observed target.
fn logging_from_status(status: Option<LoggingEnabled>) -> Option<LoggingTarget> {
    status.map(|logging| LoggingTarget::new(logging.target_bucket, logging.target_prefix))
}

/// Reads a list of bucket names out of the provided file.
fn read_bucket_names(path: &str) -> Result<Vec<String>, StageError> {
    let file = File::open(path)
        .map_err(|err| StageError::Enumeration(format!("unable to read {}: {}", path, err)))?;

    parse_bucket_names(BufReader::new(file))
}

/// Parses bucket names from a reader, one name per line.
///
/// Blank lines are skipped; an input without a single name is treated
/// as an enumeration failure rather than a silently empty run.
fn parse_bucket_names<R>(reader: R) -> Result<Vec<String>, StageError>
where
    R: BufRead,
{
    let mut names = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|err| StageError::Enumeration(err.to_string()))?;
        let name = line.trim();

        if !name.is_empty() {
            names.push(name.to_string());
        }
    }

    if names.is_empty() {
        return Err(StageError::Enumeration("no bucket names provided".into()));
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::{logging_from_status, parse_bucket_names};
    use crate::reconcile::{LoggingTarget, StageError};
    use rusoto_s3::LoggingEnabled;
    use std::io::Cursor;

    #[test]
    fn parsing_bucket_names() {
        let input = Cursor::new("bucket-a\n\nbucket-b\n");
        let names = parse_bucket_names(input).unwrap();

        assert_eq!(names, vec!["bucket-a", "bucket-b"]);
    }

    #[test]
    fn parsing_padded_bucket_names() {
        let input = Cursor::new("  bucket-a  \n   \n\tbucket-b\n");
        let names = parse_bucket_names(input).unwrap();

        assert_eq!(names, vec!["bucket-a", "bucket-b"]);
    }

    #[test]
    fn parsing_empty_files() {
        let result = parse_bucket_names(Cursor::new("\n\n"));

        assert_eq!(
            result,
            Err(StageError::Enumeration("no bucket names provided".into()))
        );
    }

    #[test]
    fn converting_logging_status() {
        let status = LoggingEnabled {
            target_bucket: "logs".to_string(),
            target_prefix: "access-logs/bucket-a".to_string(),
            target_grants: None,
        };

        let target = logging_from_status(Some(status));
        assert_eq!(
            target,
            Some(LoggingTarget::new("logs", "access-logs/bucket-a/"))
        );

        assert_eq!(logging_from_status(None), None);
    }
}
