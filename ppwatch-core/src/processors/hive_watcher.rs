//! HiveWatcher processor.
//!
//! The HiveWatcher is responsible for:
//! - Polling a Hive JSON-RPC node for new blocks
//! - Extracting `custom_json` operations whose id marks a podping
//!   (`podping`, or any id starting with `pp_`)
//! - Parsing the podping payload (v0.x `url`/`urls`, v1.x `iris`)
//! - Emitting `PodpingEvent`s into the pipeline
//!
//! A request failure rotates to the next configured node; parse failures
//! on individual operations are logged and skipped so one malformed
//! podping cannot stall the stream.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::events::{PodpingEvent, PodpingEventSender, PodpingReason};

/// Public Hive API nodes tried in order.
pub const DEFAULT_HIVE_NODES: &[&str] = &[
    "https://api.hive.blog",
    "https://api.deathwing.me",
    "https://api.openhive.network",
];

/// Hive produces a block every three seconds.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Cap on blocks fetched in a single poll, so a long outage is caught up
/// gradually instead of hammering the node.
const MAX_BLOCKS_PER_POLL: u32 = 20;

/// Errors that can occur while watching the chain.
#[derive(Debug, Error)]
pub enum WatchError {
    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Request(#[from] reqwest::Error),

    /// The node answered with a JSON-RPC error object.
    #[error("JSON-RPC error: {0}")]
    Rpc(String),

    /// The node's answer had an unexpected shape.
    #[error("unexpected response shape: {0}")]
    Parse(String),
}

/// HiveWatcher polls the chain head and feeds podpings into the pipeline.
pub struct HiveWatcher {
    nodes: Vec<String>,
    node_index: usize,
    poll_interval: Duration,
    http_client: reqwest::Client,
    event_tx: PodpingEventSender,
}

impl HiveWatcher {
    /// Create a new HiveWatcher.
    ///
    /// # Arguments
    ///
    /// * `nodes` - Hive JSON-RPC endpoints, in failover order
    /// * `poll_interval` - delay between head polls
    /// * `event_tx` - sender for extracted `PodpingEvent`s
    pub fn new(nodes: Vec<String>, poll_interval: Duration, event_tx: PodpingEventSender) -> Self {
        let nodes = if nodes.is_empty() {
            DEFAULT_HIVE_NODES.iter().map(|s| s.to_string()).collect()
        } else {
            nodes
        };
        Self {
            nodes,
            node_index: 0,
            poll_interval,
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            event_tx,
        }
    }

    /// Run the watcher until shutdown is signaled.
    ///
    /// Starts at the chain head: podpings published while the watcher was
    /// down are not replayed.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(nodes = self.nodes.len(), "HiveWatcher started");

        let mut next_block: Option<u32> = None;

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("HiveWatcher received shutdown signal");
                        break;
                    }
                }

                _ = tokio::time::sleep(self.poll_interval) => {
                    match self.poll(&mut next_block).await {
                        Ok(()) => {}
                        Err(WatchError::Request(e)) => {
                            warn!(node = %self.current_node(), error = %e, "Node unreachable, rotating");
                            self.rotate_node();
                        }
                        Err(e) => {
                            warn!(node = %self.current_node(), error = %e, "Poll failed, rotating node");
                            self.rotate_node();
                        }
                    }
                }
            }
        }

        info!("HiveWatcher shutdown complete");
    }

    /// Fetch every block from `next_block` up to the head (bounded by
    /// [`MAX_BLOCKS_PER_POLL`]) and emit the podpings they contain.
    async fn poll(&self, next_block: &mut Option<u32>) -> Result<(), WatchError> {
        let head = self.head_block_number().await?;
        let start = next_block.unwrap_or(head);
        if start > head {
            return Ok(());
        }
        let end = head.min(start.saturating_add(MAX_BLOCKS_PER_POLL - 1));

        for block_num in start..=end {
            let Some(block) = self.fetch_block(block_num).await? else {
                // Head advanced past a block the node has not served yet.
                break;
            };

            for event in extract_podpings(block_num, &block) {
                debug!(
                    block = block_num,
                    trx_id = %event.trx_id,
                    reason = %event.reason,
                    urls = event.urls.len(),
                    "Extracted podping"
                );
                if self.event_tx.send(event).await.is_err() {
                    // Pipeline is shutting down.
                    return Ok(());
                }
            }

            *next_block = Some(block_num + 1);
        }

        Ok(())
    }

    async fn head_block_number(&self) -> Result<u32, WatchError> {
        #[derive(Debug, Deserialize)]
        struct DynamicGlobalProperties {
            head_block_number: u32,
        }

        let props: DynamicGlobalProperties = self
            .rpc("condenser_api.get_dynamic_global_properties", serde_json::json!([]))
            .await?
            .ok_or_else(|| WatchError::Parse("missing dynamic global properties".to_string()))?;
        Ok(props.head_block_number)
    }

    async fn fetch_block(&self, block_num: u32) -> Result<Option<SignedBlock>, WatchError> {
        // `get_block` answers null for blocks not yet produced.
        self.rpc("condenser_api.get_block", serde_json::json!([block_num]))
            .await
    }

    async fn rpc<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<Option<T>, WatchError> {
        #[derive(Debug, Deserialize)]
        struct RpcEnvelope<T> {
            result: Option<T>,
            error: Option<RpcError>,
        }

        #[derive(Debug, Deserialize)]
        struct RpcError {
            message: String,
        }

        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let response = self
            .http_client
            .post(self.current_node())
            .json(&body)
            .send()
            .await?;

        let envelope: RpcEnvelope<T> = response.json().await?;
        if let Some(error) = envelope.error {
            return Err(WatchError::Rpc(error.message));
        }
        Ok(envelope.result)
    }

    fn current_node(&self) -> &str {
        &self.nodes[self.node_index % self.nodes.len()]
    }

    fn rotate_node(&mut self) {
        self.node_index = (self.node_index + 1) % self.nodes.len();
    }
}

/// A Hive block as returned by `condenser_api.get_block`, reduced to the
/// fields the watcher needs.
#[derive(Debug, Deserialize)]
struct SignedBlock {
    #[serde(default)]
    transactions: Vec<HiveTransaction>,
    #[serde(default)]
    transaction_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct HiveTransaction {
    /// Condenser-format operations: `["op_name", { ...fields }]` pairs.
    #[serde(default)]
    operations: Vec<(String, serde_json::Value)>,
}

/// Podping custom_json payload. v1.x publishes `iris`, v0.x `urls` or a
/// single `url`; `reason` defaults to `update` when absent.
#[derive(Debug, Deserialize)]
struct PodpingPayload {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    iris: Option<Vec<String>>,
    #[serde(default)]
    urls: Option<Vec<String>>,
    #[serde(default)]
    url: Option<String>,
}

fn is_podping_id(id: &str) -> bool {
    id == "podping" || id.starts_with("pp_")
}

/// Pull every podping out of a block.
fn extract_podpings(block_num: u32, block: &SignedBlock) -> Vec<PodpingEvent> {
    let mut events = Vec::new();

    for (index, transaction) in block.transactions.iter().enumerate() {
        let trx_id = block
            .transaction_ids
            .get(index)
            .cloned()
            .unwrap_or_default();

        for (op_name, op) in &transaction.operations {
            if op_name != "custom_json" {
                continue;
            }
            let Some(id) = op.get("id").and_then(serde_json::Value::as_str) else {
                continue;
            };
            if !is_podping_id(id) {
                continue;
            }
            let Some(raw_json) = op.get("json").and_then(serde_json::Value::as_str) else {
                continue;
            };

            let payload: PodpingPayload = match serde_json::from_str(raw_json) {
                Ok(payload) => payload,
                Err(e) => {
                    debug!(block = block_num, %trx_id, error = %e, "Skipping unparseable podping payload");
                    continue;
                }
            };

            let urls = payload
                .iris
                .or(payload.urls)
                .or_else(|| payload.url.map(|url| vec![url]))
                .unwrap_or_default();
            if urls.is_empty() {
                continue;
            }

            events.push(PodpingEvent {
                trx_id: trx_id.clone(),
                block_num,
                reason: PodpingReason::from(payload.reason.as_deref().unwrap_or("update")),
                urls,
            });
        }
    }

    events
}
