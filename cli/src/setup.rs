//! Config loading and the wiring shared by every node command.

use anyhow::{Context, Result};
use eventscope_core::{Address, Classifier, TokenMetadataProvider, B256};
use eventscope_rpc::{HttpClientConfig, HttpRpcClient, RetryConfig};
use eventscope_stream::{EventPipeline, LineSink, OutputFormat, UnknownEventPolicy, WatchConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

pub fn load_config(path: Option<&Path>) -> Result<WatchConfig> {
    match path {
        Some(path) => WatchConfig::from_file(path)
            .with_context(|| format!("loading config '{}'", path.display())),
        None => Ok(WatchConfig::default()),
    }
}

/// Flags win over the config file.
pub fn apply_global_flags(
    config: &mut WatchConfig,
    verbose: bool,
    json: bool,
    signatures: Option<PathBuf>,
) {
    if verbose {
        config.log.level = "debug".into();
    }
    if json {
        config.pipeline.output = OutputFormat::Json;
    }
    if signatures.is_some() {
        config.registry.path = signatures;
    }
}

pub fn override_rpc(config: &mut WatchConfig, http_url: Option<String>, ws_url: Option<String>) {
    if http_url.is_some() {
        config.rpc.http_url = http_url;
    }
    if ws_url.is_some() {
        config.rpc.ws_url = ws_url;
    }
}

pub fn apply_suppress(config: &mut WatchConfig, suppress_unknown: bool) {
    if suppress_unknown {
        config.pipeline.unknown_events = UnknownEventPolicy::Suppress;
    }
}

pub fn parse_address(s: &str) -> Result<Address> {
    s.parse::<Address>()
        .with_context(|| format!("invalid address '{s}'"))
}

pub fn parse_hash(s: &str) -> Result<B256> {
    s.parse::<B256>()
        .with_context(|| format!("invalid 32-byte hash '{s}'"))
}

pub fn http_client(config: &WatchConfig, url: &str) -> Result<Arc<HttpRpcClient>> {
    let client = HttpRpcClient::new(
        url,
        HttpClientConfig {
            retry: RetryConfig {
                max_retries: config.rpc.max_retries,
                ..RetryConfig::default()
            },
            request_timeout_ms: config.rpc.request_timeout_ms,
        },
    )
    .with_context(|| format!("creating HTTP client for {url}"))?;
    Ok(Arc::new(client))
}

pub fn classifier(
    config: &WatchConfig,
    metadata: Arc<dyn TokenMetadataProvider>,
) -> Result<Classifier> {
    let registry = config
        .registry
        .load()
        .context("loading signature registry")?;
    info!(signatures = registry.len(), "signature registry ready");
    Ok(Classifier::new(Arc::new(registry))
        .with_metadata(metadata)
        .with_lookup_timeout(config.pipeline.metadata_timeout()))
}

/// Classifier, stdout sink and unknown-event policy, as configured.
pub fn pipeline(
    config: &WatchConfig,
    metadata: Arc<dyn TokenMetadataProvider>,
) -> Result<Arc<EventPipeline>> {
    let classifier = classifier(config, metadata)?;
    let sink = Arc::new(LineSink::stdout(config.pipeline.output));
    let pipeline = EventPipeline::new(Arc::new(classifier), sink)
        .with_unknown_events(config.pipeline.unknown_events);
    Ok(Arc::new(pipeline))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values() {
        let mut config = WatchConfig::from_yaml_str(
            "rpc:\n  http_url: http://file:8545\npipeline:\n  output: text\n",
        )
        .unwrap();
        apply_global_flags(&mut config, true, true, Some(PathBuf::from("sigs.txt")));
        override_rpc(&mut config, Some("http://flag:8545".into()), None);
        apply_suppress(&mut config, true);

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.pipeline.output, OutputFormat::Json);
        assert_eq!(config.registry.path, Some(PathBuf::from("sigs.txt")));
        assert_eq!(config.rpc.http_url.as_deref(), Some("http://flag:8545"));
        assert_eq!(config.pipeline.unknown_events, UnknownEventPolicy::Suppress);
    }

    #[test]
    fn absent_flags_keep_file_values() {
        let mut config = WatchConfig::from_yaml_str("rpc:\n  ws_url: ws://file:8546\n").unwrap();
        apply_global_flags(&mut config, false, false, None);
        override_rpc(&mut config, None, None);
        assert_eq!(config.rpc.ws_url.as_deref(), Some("ws://file:8546"));
        assert_eq!(config.log.level, "info");
        assert!(config.registry.path.is_none());
    }

    #[test]
    fn parses_cli_hex_values() {
        assert!(parse_address("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48").is_ok());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_hash("0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef").is_ok());
    }
}
