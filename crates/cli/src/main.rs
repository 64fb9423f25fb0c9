//! `ragllm` CLI entry point.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Load configuration**: a `.env` file if present, then the process
//!    environment and command-line flags.
//! 2. **Wire observability**: `tracing-subscriber` with a compact or JSON
//!    layer, plus an OpenTelemetry OTLP exporter when
//!    `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
//! 3. **Construct infrastructure**: one [`llm::OpenAiProvider`], wrapped in a
//!    [`dispatch::MultiModel`] rotation with one descriptor per API key.
//! 4. **Run the command**: `complete` or `embed`.

use anyhow::Result;
use clap::Parser;

mod args;
mod commands;
mod telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = args::Cli::parse();
    let _telemetry = telemetry::init(cli.log_format)?;
    commands::run(cli).await
}
