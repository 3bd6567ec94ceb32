//! Utilities to configure AWS access logging in a CLI.
//!
//! This tool should be used from a command line and can be used in many
//! different ways; please see the main documentation in the repository.
//!
//! Credentials must be provided via guidelines in the [AWS Documentation]
//! (https://docs.aws.amazon.com/cli/latest/userguide/cli-environment.html).
#[macro_use]
extern crate log as logger;

use rusoto_core::{credential::ChainProvider, HttpClient};
use rusoto_elbv2::ElbClient;
use rusoto_s3::S3Client;

use std::time::Duration;

mod cli;
mod log;
mod reconcile;
mod types;
mod walker;

mod elb;
mod s3;

#[tokio::main]
async fn main() -> types::UtilResult<()> {
    // build the CLI and grab all arguments
    let args = cli::build().get_matches();

    // initialize logging
    log::init(&args)?;

    // region is taken from the selected subcommand
    let region = cli::get_region(&args)?;

    // create the new AWS clients against the requested region
    let s3 = S3Client::new_with(HttpClient::new()?, provider(), region.clone());
    let elb = ElbClient::new_with(HttpClient::new()?, provider(), region);

    // delegate to the cli mod
    cli::exec(s3, elb, &args).await
}

/// Creates a credentials provider with a sane lookup timeout.
fn provider() -> ChainProvider {
    let mut chain = ChainProvider::new();
    chain.set_timeout(Duration::from_millis(500));
    chain
}
