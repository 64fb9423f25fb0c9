//! Command-line arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use llm::ApiFlavor;
use serde_json::Value;

/// Call hosted LLMs the way the RAG pipeline does.
#[derive(Debug, Parser)]
#[command(name = "ragllm", version, about)]
pub struct Cli {
    /// Wire dialect of the endpoint.
    #[arg(long, value_enum, env = "RAGLLM_FLAVOR", default_value_t = Flavor::Azure, global = true)]
    pub flavor: Flavor,

    /// Endpoint URL; overrides the flavour's environment variable.
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// API version (Azure only); overrides the flavour's environment variable.
    #[arg(long, global = true)]
    pub api_version: Option<String>,

    /// API key. Repeat to round-robin completions across several keys.
    #[arg(
        long = "api-key",
        env = "RAGLLM_API_KEYS",
        value_delimiter = ',',
        hide_env_values = true,
        global = true
    )]
    pub api_keys: Vec<String>,

    /// Seconds allowed per attempt; for streams, until the response starts.
    #[arg(long, env = "RAGLLM_TIMEOUT_SECS", default_value_t = 120, global = true)]
    pub timeout_secs: u64,

    /// Seconds a response body may stay silent before the call fails.
    #[arg(long, env = "RAGLLM_READ_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub read_timeout_secs: u64,

    /// Log output format (logs go to stderr).
    #[arg(long, value_enum, env = "RAGLLM_LOG_FORMAT", default_value_t = LogFormat::Compact, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a chat completion.
    Complete(CompleteArgs),
    /// Embed one or more texts and print the matrix as JSON.
    Embed(EmbedArgs),
}

#[derive(Debug, Args)]
pub struct CompleteArgs {
    /// User prompt.
    pub prompt: String,

    /// System prompt sent before the user prompt.
    #[arg(long)]
    pub system: Option<String>,

    /// Model or Azure deployment name.
    #[arg(long)]
    pub model: Option<String>,

    /// Print fragments as they arrive.
    #[arg(long)]
    pub stream: bool,

    /// Reduce the completion to the JSON object it contains.
    #[arg(long)]
    pub keyword_extraction: bool,

    /// Extra request option as KEY=VALUE; VALUE is parsed as JSON when possible.
    #[arg(long = "option", value_name = "KEY=VALUE", value_parser = parse_option)]
    pub options: Vec<(String, Value)>,
}

#[derive(Debug, Args)]
pub struct EmbedArgs {
    /// Texts to embed.
    #[arg(required = true)]
    pub texts: Vec<String>,

    /// Embedding model or Azure deployment name.
    #[arg(long)]
    pub model: Option<String>,

    /// Expected vector width of the embedding model.
    #[arg(long)]
    pub dimension: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Flavor {
    Azure,
    #[value(name = "openai")]
    OpenAi,
}

impl From<Flavor> for ApiFlavor {
    fn from(flavor: Flavor) -> Self {
        match flavor {
            Flavor::Azure => ApiFlavor::Azure,
            Flavor::OpenAi => ApiFlavor::OpenAi,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

fn parse_option(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty option key in '{raw}'"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}
