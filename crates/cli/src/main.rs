// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use harness_cli::config::Config;
use harness_cli::{logging, orchestrator};

#[tokio::main]
async fn main() {
    let config = Config::parse();
    if let Err(err) = config.validate() {
        eprintln!("harness-mux: {err}");
        std::process::exit(1);
    }
    logging::init_tracing(&config);

    let code = orchestrator::run(config).await;
    std::process::exit(code);
}
