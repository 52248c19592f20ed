//! Commands that talk to a node: `poll`, `watch`, `listen`.

use anyhow::{anyhow, Context, Result};
use eventscope_core::{transfer_signature, LogFilter, NodeClient, TransportError};
use eventscope_rpc::{Erc20Metadata, EthNode, RpcTransport, WsRpcClient};
use eventscope_stream::{HistoricalPoller, InProcessLogBus, LiveSubscriber, PushListener, WatchConfig};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{error, info};

use crate::setup;

/// HTTP endpoint if configured, otherwise the WebSocket connection.
fn metadata_transport(config: &WatchConfig, ws: &Arc<WsRpcClient>) -> Result<Arc<dyn RpcTransport>> {
    let transport: Arc<dyn RpcTransport> = match config.rpc.http_url.as_deref() {
        Some(url) => setup::http_client(config, url)?,
        None => ws.clone(),
    };
    Ok(transport)
}

async fn connect_ws(config: &WatchConfig) -> Result<Arc<WsRpcClient>> {
    let url = config
        .rpc
        .ws_url
        .as_deref()
        .context("no WebSocket endpoint: pass --ws or set EVENTSCOPE_WS_URL")?;
    let ws = WsRpcClient::connect(url)
        .await
        .with_context(|| format!("connecting to {url}"))?;
    Ok(Arc::new(ws))
}

pub async fn poll(config: &WatchConfig) -> Result<()> {
    let url = config
        .rpc
        .http_url
        .as_deref()
        .context("no HTTP endpoint: pass --rpc or set EVENTSCOPE_HTTP_URL")?;
    let http = setup::http_client(config, url)?;
    let pipeline = setup::pipeline(config, Arc::new(Erc20Metadata::new(http.clone())))?;
    let node = Arc::new(EthNode::new(http));

    let summary = HistoricalPoller::from_config(node, pipeline, &config.poll)
        .run()
        .await
        .context("historical poll failed")?;
    eprintln!("{summary}");
    Ok(())
}

pub async fn watch(config: &WatchConfig) -> Result<()> {
    let ws = connect_ws(config).await?;
    let metadata = Erc20Metadata::new(metadata_transport(config, &ws)?);
    let pipeline = setup::pipeline(config, Arc::new(metadata))?;
    let node = Arc::new(EthNode::websocket(ws));

    let handle = LiveSubscriber::new(node, pipeline)
        .spawn()
        .await
        .context("subscribing to logs")?;
    info!(subscription = handle.subscription_id(), "watching; Ctrl-C to stop");

    let summary = handle
        .close_on(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for Ctrl-C");
                futures::future::pending::<()>().await;
            }
        })
        .await
        .context("live subscription ended")?;
    eprintln!("{} records on subscription {}", summary.records, summary.subscription);
    Ok(())
}

/// Feeds an [`InProcessLogBus`] from a Transfer-topic subscription and lets a
/// [`PushListener`] consume it, the way a node plugin would.
pub async fn listen(config: &WatchConfig) -> Result<()> {
    let ws = connect_ws(config).await?;
    let metadata = Erc20Metadata::new(metadata_transport(config, &ws)?);
    let pipeline = setup::pipeline(config, Arc::new(metadata))?;
    let node = EthNode::websocket(ws);

    let bus = Arc::new(InProcessLogBus::new());
    let listener = PushListener::new(bus.clone(), pipeline).with_name("listen");
    listener.start()?;

    let mut subscription = node
        .subscribe_logs(&LogFilter::all().event(transfer_signature()))
        .await
        .context("subscribing to Transfer logs")?;
    info!(subscription = %subscription.id, "forwarding Transfer logs to the push listener; Ctrl-C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let outcome: Result<(), TransportError> = loop {
        tokio::select! {
            _ = &mut ctrl_c => break Ok(()),
            item = subscription.stream.next() => match item {
                Some(Ok(record)) => {
                    bus.publish(&record);
                }
                Some(Err(e)) => break Err(e),
                None => break Err(TransportError::Closed),
            },
        }
    };

    if outcome.is_ok() {
        if let Err(e) = node.unsubscribe(&subscription.id).await {
            error!(error = %e, "unsubscribe failed");
        }
    }
    let processed = listener.stop().await?;
    eprintln!("{processed} records through the push listener");
    outcome.map_err(|e| anyhow!(e).context("Transfer subscription ended"))
}
