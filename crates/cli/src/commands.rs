//! Subcommand handlers.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dispatch::{ModelDescriptor, MultiModel};
use futures_util::StreamExt;
use llm::{OpenAiProvider, ProviderConfig};
use pipeline::{
    ApiKey, ApiVersion, CallOptions, ChatRequest, Credentials, EmbeddingProvider,
    EmbeddingRequest, EmbeddingSpec, ModelName,
};
use serde_json::Map;

use crate::args::{Cli, Command, CompleteArgs, EmbedArgs};

pub async fn run(cli: Cli) -> Result<()> {
    let config = provider_config(&cli)?;
    let provider = Arc::new(OpenAiProvider::new(config).context("failed to create provider")?);
    match cli.command {
        Command::Complete(args) => complete(provider, &cli.api_keys, args).await,
        Command::Embed(args) => embed(provider, &cli.api_keys, args).await,
    }
}

fn provider_config(cli: &Cli) -> Result<ProviderConfig> {
    let mut config = ProviderConfig::from_env(cli.flavor.into())
        .with_timeout(Duration::from_secs(cli.timeout_secs))
        .with_read_timeout(Duration::from_secs(cli.read_timeout_secs));
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint.clone());
    }
    if let Some(version) = &cli.api_version {
        let version = ApiVersion::new(version.as_str()).context("--api-version is empty")?;
        config = config.with_api_version(version);
    }
    Ok(config)
}

/// One descriptor per key, all sharing a single provider and its connection
/// pool. With no keys, one descriptor relies on the configured key.
fn rotation(provider: Arc<OpenAiProvider>, keys: &[String], fixed: CallOptions) -> Result<MultiModel> {
    let descriptors = if keys.is_empty() {
        vec![ModelDescriptor::new("default", provider).with_options(fixed)]
    } else {
        keys.iter()
            .enumerate()
            .map(|(i, key)| {
                let mut options = fixed.clone();
                options.credentials.api_key = ApiKey::new(key.as_str());
                ModelDescriptor::new(format!("key-{}", i + 1), provider.clone())
                    .with_options(options)
            })
            .collect()
    };
    Ok(MultiModel::new(descriptors)?)
}

async fn complete(provider: Arc<OpenAiProvider>, keys: &[String], args: CompleteArgs) -> Result<()> {
    let fixed = CallOptions {
        model: args.model.and_then(ModelName::new),
        keyword_extraction: args.keyword_extraction,
        ..CallOptions::default()
    };
    let models = rotation(provider, keys, fixed)?;

    let extra: Map<_, _> = args.options.into_iter().collect();
    let options = CallOptions::from_map(extra).context("invalid --option")?;
    let mut request = ChatRequest::new(args.prompt).with_options(options);
    if let Some(system) = args.system {
        request = request.with_system_prompt(system);
    }

    let mut stdout = std::io::stdout().lock();
    if args.stream {
        let mut fragments = models.dispatch_stream(&request).await?;
        while let Some(fragment) = fragments.next().await {
            stdout.write_all(fragment?.as_bytes())?;
            stdout.flush()?;
        }
        writeln!(stdout)?;
    } else {
        let text = models.dispatch(&request).await?;
        writeln!(stdout, "{text}")?;
    }
    Ok(())
}

async fn embed(provider: Arc<OpenAiProvider>, keys: &[String], args: EmbedArgs) -> Result<()> {
    let model = args.model.and_then(ModelName::new);
    let spec = provider.config().embedding.clone();
    let provider = match (args.dimension, &model) {
        (None, None) => provider,
        _ => {
            let embedding = EmbeddingSpec {
                model: model.clone().unwrap_or(spec.model),
                dimension: args.dimension.unwrap_or(spec.dimension),
                max_token_size: spec.max_token_size,
            };
            let config = provider.config().clone().with_embedding(embedding);
            Arc::new(
                OpenAiProvider::new(config)
                    .context("failed to create provider")?
                    .with_backoff(*provider.backoff()),
            )
        }
    };

    let request = EmbeddingRequest {
        texts: args.texts,
        model,
        credentials: Credentials {
            api_key: keys.first().and_then(|k| ApiKey::new(k.as_str())),
            ..Credentials::default()
        },
    };
    let matrix = provider.embed(&request).await?;
    tracing::info!(rows = matrix.len(), dimension = matrix.dimension(), "embedded");
    println!("{}", serde_json::to_string(&matrix)?);
    Ok(())
}
