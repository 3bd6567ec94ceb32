//! Configure access log delivery for Elastic Load Balancers.
//!
//! Walks every load balancer in the region, compares its current
//! `access_logs.s3.*` attributes against the desired delivery target,
//! and modifies the attributes for any balancer which differs. Each
//! balancer is handled in isolation; a failed lookup or write for one
//! never stops the rest of the region from being processed.
use clap::{App, Arg, ArgMatches, SubCommand};
use rusoto_elbv2::*;

use crate::cli;
use crate::reconcile::{
    normalize_prefix, Action, ChangeRecord, LoggingTarget, Outcome, StageError, Summary,
};
use crate::types::{self, UtilResult};
use crate::walker::BalancerWalker;

/// Generates an appropriate `SubCommand` for this module.
pub fn cmd<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("elb")
        .about("Configure access log delivery for load balancers")
        .args(&cli::global_args())
        .args(&[
            Arg::with_name("bucket")
                .help("An S3 bucket to deliver access logs into")
                .index(2)
                .required(true),
            Arg::with_name("prefix")
                .help("A base prefix to store access logs under")
                .short("p")
                .long("prefix")
                .takes_value(true),
        ])
}

/// Executes this subcommand and returns a `UtilResult` to indicate success.
pub async fn exec(elb: ElbClient, args: &ArgMatches<'_>) -> UtilResult<()> {
    // parse all global arguments
    let dryrun = cli::is_dry_run(args);

    // bucket is required, prefix defaults to the bucket root
    let bucket = args.value_of("bucket").unwrap();
    let base = normalize_prefix(args.value_of("prefix").unwrap_or(""));

    let mut summary = Summary::default();
    let mut walker = BalancerWalker::new(&elb);

    // walk across all load balancers in the region
    while let Some(balancer) = walker.next().await? {
        // both fields are always present on described balancers
        let (name, arn) = match (balancer.load_balancer_name, balancer.load_balancer_arn) {
            (Some(name), Some(arn)) => (name, arn),
            _ => continue,
        };

        // each balancer delivers under the base prefix and its own name
        let desired = LoggingTarget::new(bucket, format!("{}{}", base, name));

        // reconcile and apply, trapping per-balancer failures
        match process(&elb, &arn, &name, desired, dryrun).await {
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

/// Reconciles a single load balancer and applies any required change.
async fn process(
    elb: &ElbClient,
    arn: &str,
    name: &str,
    desired: LoggingTarget,
    dryrun: bool,
) -> Result<Outcome, StageError> {
    // one read call to observe the current state
    let observed = fetch_logging(elb, arn).await?;
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

    apply(elb, arn, &record).await?;
    Ok(Outcome::Applied)
}

/// Fetches the currently observed logging target of a load balancer.
async fn fetch_logging(elb: &ElbClient, arn: &str) -> Result<Option<LoggingTarget>, StageError> {
    let request = DescribeLoadBalancerAttributesInput {
        load_balancer_arn: arn.to_string(),
    };

    let response = elb
        .describe_load_balancer_attributes(request)
        .await
        .map_err(|err| StageError::Lookup(types::error_message(err)))?;

    Ok(logging_from_attributes(
        response.attributes.unwrap_or_default(),
    ))
}

/// Issues the write call to point a balancer at the planned target.
async fn apply(elb: &ElbClient, arn: &str, record: &ChangeRecord) -> Result<(), StageError> {
    let request = ModifyLoadBalancerAttributesInput {
        load_balancer_arn: arn.to_string(),
        attributes: vec![
            attribute("access_logs.s3.enabled", "true"),
            attribute("access_logs.s3.bucket", &record.after.bucket),
            attribute("access_logs.s3.prefix", &record.after.prefix),
        ],
    };

    elb.modify_load_balancer_attributes(request)
        .await
        .map_err(|err| StageError::Apply(types::error_message(err)))?;

    Ok(())
}

/// Decodes the logging target out of a raw attribute listing.
///
/// Disabled balancers report `access_logs.s3.enabled` as "false" with
/// empty bucket/prefix values, which maps to an absent target here.
fn logging_from_attributes(attributes: Vec<LoadBalancerAttribute>) -> Option<LoggingTarget> {
    let mut enabled = false;
    let mut bucket = None;
    let mut prefix = String::new();

    for attribute in attributes {
        match (attribute.key.as_deref(), attribute.value) {
            (Some("access_logs.s3.enabled"), Some(value)) => enabled = value == "true",
            (Some("access_logs.s3.bucket"), Some(value)) if !value.is_empty() => {
                bucket = Some(value)
            }
            (Some("access_logs.s3.prefix"), Some(value)) => prefix = value,
            _ => (),
        }
    }

    if !enabled {
        return None;
    }

    bucket.map(|bucket| LoggingTarget::new(bucket, prefix))
}

/// Constructs a single key/value attribute pair.
fn attribute(key: &str, value: &str) -> LoadBalancerAttribute {
    LoadBalancerAttribute {
        key: Some(key.to_string()),
        value: Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::{attribute, logging_from_attributes};
    use crate::reconcile::LoggingTarget;

    #[test]
    fn decoding_disabled_balancers() {
        let attributes = vec![
            attribute("access_logs.s3.enabled", "false"),
            attribute("access_logs.s3.bucket", ""),
            attribute("access_logs.s3.prefix", ""),
        ];

        assert_eq!(logging_from_attributes(attributes), None);
        assert_eq!(logging_from_attributes(Vec::new()), None);
    }

    #[test]
    fn decoding_enabled_balancers() {
        let attributes = vec![
            attribute("idle_timeout.timeout_seconds", "60"),
            attribute("access_logs.s3.enabled", "true"),
            attribute("access_logs.s3.bucket", "logs"),
            attribute("access_logs.s3.prefix", "lb/app"),
        ];

        let target = logging_from_attributes(attributes);
        assert_eq!(target, Some(LoggingTarget::new("logs", "lb/app/")));
    }

    #[test]
    fn decoding_enabled_without_bucket() {
        let attributes = vec![attribute("access_logs.s3.enabled", "true")];

        assert_eq!(logging_from_attributes(attributes), None);
    }
}
