// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanbook: scanned textbook pages to a navigable markdown book.
//
// Entry point. Initialises logging, parses the command line, and hands off
// to the pipeline.

mod cli;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

/// How long exit waits for conversions abandoned after a timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    // Logs go to stderr so the run summary on stdout stays clean.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: cannot start async runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let code = runtime.block_on(async {
        match cli::run(args).await {
            Ok(code) => code,
            Err(err) => {
                tracing::error!(error = %err, "Scanbook cannot continue");
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        }
    });

    // Dropping the runtime would wait for every blocking conversion, including
    // ones that already timed out.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    code
}
