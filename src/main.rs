//! `hkex` command-line entry point.
//!
//! Reads `.env`, installs a stderr log subscriber and hands off to the
//! command dispatcher. Stdout is left to the commands' own reports.

use std::process::ExitCode;

use hkex_etl::cli;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "hkex_etl=info"
    } else {
        "hkex_etl=warn"
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let stderr = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(stderr).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_logging(cli::is_verbose());
    cli::run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_follows_verbosity() {
        assert_eq!(default_directive(true), "hkex_etl=info");
        assert_eq!(default_directive(false), "hkex_etl=warn");
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }
}
