//! `webfinger`: look up a resource and print its JRD.
//!
//! ```text
//! webfinger -v bob@example.com
//! webfinger --legacy --rel http://webfinger.net/rel/profile-page acct:bob@example.com
//! ```

use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use webfinger::{
    Client, ClientConfig, ErrorKind, SubjectVerification, WebFingerError, WEBFIST_DEFAULT_SERVER,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Resource to look up: an email-like handle or an absolute URI
    resource: String,

    /// Print details about the resolution
    #[arg(short, long)]
    verbose: bool,

    /// Only return links with this relation type (repeatable)
    #[arg(long = "rel", value_name = "REL")]
    rels: Vec<String>,

    /// Fall back to the original host-meta / LRDD protocol
    #[arg(long)]
    legacy: bool,

    /// Retry over plain http when https connections are refused
    #[arg(long)]
    insecure: bool,

    /// Fall back to a WebFist server
    #[arg(
        long,
        value_name = "HOST",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = WEBFIST_DEFAULT_SERVER
    )]
    webfist: Option<String>,

    /// Check the returned subject on every strategy, not only the first
    #[arg(long, conflicts_with = "no_verify")]
    verify_all: bool,

    /// Do not check the returned subject
    #[arg(long)]
    no_verify: bool,

    /// Overall deadline in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<f64>,
}

impl Args {
    fn config(&self) -> anyhow::Result<ClientConfig> {
        let subject_verification = if self.no_verify {
            SubjectVerification::Disabled
        } else if self.verify_all {
            SubjectVerification::AllStrategies
        } else {
            SubjectVerification::PrimaryOnly
        };

        let lookup_timeout = self
            .timeout
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("invalid --timeout")?;

        Ok(ClientConfig {
            legacy_support: self.legacy,
            insecure_fallback: self.insecure,
            fallback_host: self.webfist.clone(),
            subject_verification,
            lookup_timeout,
            ..Default::default()
        })
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "webfinger=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(err: &WebFingerError) -> ExitCode {
    match err.kind() {
        ErrorKind::Identifier => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let client = Client::new(args.config()?)?;
    match client.lookup(&args.resource, args.rels.as_slice()).await {
        Ok(descriptor) => {
            println!("{}", serde_json::to_string_pretty(&descriptor)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("{err}");
            Ok(exit_code(&err))
        }
    }
}
