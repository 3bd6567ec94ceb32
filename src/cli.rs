//! CLI bindings for all internal commands and modules.
//!
//! This module focuses on the common CLI bindings required to provide easy
//! APIs and consistency across all other modules. This is where the parent
//! CLI can be found, as well as utilities for fetching common switches and
//! values.
use clap::{App, AppSettings, Arg, ArgMatches};
use rusoto_core::region::Region;
use rusoto_elbv2::ElbClient;
use rusoto_s3::S3Client;

use crate::types::UtilResult;

/// Constructs a new CLI application using Clap.
///
/// This will register all subcommand modules and embed all metadata. All
/// metadata is fetched dynamically from Cargo and shouldn't require to
/// be updated (ever).
pub fn build<'a, 'b>() -> App<'a, 'b> {
    App::new("")
        .name(env!("CARGO_PKG_NAME"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .subcommand(crate::elb::cmd())
        .subcommand(crate::s3::cmd())
        .settings(&[
            AppSettings::ArgRequiredElseHelp,
            AppSettings::DisableHelpSubcommand,
            AppSettings::SubcommandRequiredElseHelp,
            AppSettings::VersionlessSubcommands,
        ])
}

/// Executes a subcommand based on the parsed arguments from the CLI.
///
/// This will pass singleton AWS clients to each submodule to avoid
/// having to construct a client inside each module.
pub async fn exec(s3: S3Client, elb: ElbClient, args: &ArgMatches<'_>) -> UtilResult<()> {
    match args.subcommand() {
        ("elb", Some(subargs)) => crate::elb::exec(elb, subargs).await,
        ("s3", Some(subargs)) => crate::s3::exec(s3, subargs).await,
        _ => {
            build().print_help().expect("Unable to log to TTY");
            Ok(())
        }
    }
}

/// Fetches the matches of whichever subcommand was selected.
pub fn sub_args<'a>(args: &'a ArgMatches<'a>) -> Option<&'a ArgMatches<'a>> {
    args.subcommand().1
}

/// Fetches the AWS region from the common argument set.
///
/// The region lives on the subcommand arguments, so this digs through
/// the selected subcommand before falling back to the default chain.
pub fn get_region(args: &ArgMatches<'_>) -> UtilResult<Region> {
    match sub_args(args).and_then(|sub| sub.value_of("region")) {
        Some(name) => Ok(name.parse()?),
        None => Ok(Region::default()),
    }
}

/// Fetches the set of global arguments which should be attached on each command.
pub fn global_args<'a, 'b>() -> [Arg<'a, 'b>; 3] {
    [
        Arg::with_name("dry")
            .help("Only print out the calculated changes")
            .short("d")
            .long("dry-run"),
        Arg::with_name("quiet")
            .help("Only prints errors during execution")
            .short("q")
            .long("quiet"),
        Arg::with_name("region")
            .help("An AWS region to work within")
            .index(1)
            .required(true),
    ]
}

/// Determines if the dry-run switch was provided in this execution.
pub fn is_dry_run(args: &ArgMatches<'_>) -> bool {
    args.is_present("dry")
}
