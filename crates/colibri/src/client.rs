//! Node-pool driver: satisfies [`DataRequest`]s over HTTP with failover
//! across configured nodes, honoring the exclusion mask and the preferred
//! client type, and classifying every completion.

use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

use crate::classify::{classify_response, ResponseClass};
use crate::types::chain::{
    MAINNET, MAINNET_BEACON_API, MAINNET_CHECKPOINTZ_1, MAINNET_CHECKPOINTZ_2,
    MAINNET_CHECKPOINTZ_3, MAINNET_CHECKPOINTZ_4, MAINNET_ETH_RPC, MAINNET_PROVER, SEPOLIA,
    SEPOLIA_BEACON_API, SEPOLIA_ETH_RPC, SEPOLIA_PROVER,
};
use crate::types::error::{ColibriError, Result};
use crate::types::request::{DataRequest, Encoding, HttpMethod, RequestKind, RequestState, MAX_NODES};

/// Client-type bit used by requests that prefer a Lodestar-flavoured beacon
/// node (vendor endpoints such as historical summaries).
pub const CLIENT_TYPE_LODESTAR: u32 = 1;

#[derive(Debug, Clone)]
pub struct Node {
    pub url: String,
    pub client_type: u32,
}

impl Node {
    fn from_url(url: &str) -> Self {
        // The default mainnet beacon endpoint is a Lodestar deployment; mark
        // it so summary fetches prefer it.
        let client_type = if url.contains("lodestar") { CLIENT_TYPE_LODESTAR } else { 0 };
        Self { url: url.trim_end_matches('/').to_string(), client_type }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodePoolConfig {
    pub chain_id: u64,
    pub beacon: Vec<String>,
    pub exec: Vec<String>,
    pub rest: Vec<String>,
    pub prover: Vec<String>,
    pub checkpointz: Vec<String>,
}

impl NodePoolConfig {
    /// Default public endpoints for the given chain.
    pub fn new(chain_id: u64) -> Self {
        let (beacon, exec, prover, checkpointz) = match chain_id {
            MAINNET => (
                vec![MAINNET_BEACON_API.into()],
                vec![MAINNET_ETH_RPC.into()],
                vec![MAINNET_PROVER.into()],
                vec![
                    MAINNET_CHECKPOINTZ_1.into(),
                    MAINNET_CHECKPOINTZ_2.into(),
                    MAINNET_CHECKPOINTZ_3.into(),
                    MAINNET_CHECKPOINTZ_4.into(),
                ],
            ),
            SEPOLIA => (
                vec![SEPOLIA_BEACON_API.into()],
                vec![SEPOLIA_ETH_RPC.into()],
                vec![SEPOLIA_PROVER.into()],
                vec![],
            ),
            _ => (
                vec![MAINNET_BEACON_API.into()],
                vec![MAINNET_ETH_RPC.into()],
                vec![MAINNET_PROVER.into()],
                vec![],
            ),
        };
        Self { chain_id, beacon, exec, rest: vec![], prover, checkpointz }
    }

    pub fn with_beacon(mut self, urls: Vec<String>) -> Self {
        if !urls.is_empty() {
            self.beacon = urls;
        }
        self
    }

    pub fn with_exec(mut self, urls: Vec<String>) -> Self {
        if !urls.is_empty() {
            self.exec = urls;
        }
        self
    }

    pub fn with_prover(mut self, urls: Vec<String>) -> Self {
        if !urls.is_empty() {
            self.prover = urls;
        }
        self
    }
}

pub struct NodePool {
    http: Client,
    beacon: Vec<Node>,
    exec: Vec<Node>,
    rest: Vec<Node>,
    prover: Vec<Node>,
    checkpointz: Vec<Node>,
}

fn to_nodes(urls: &[String]) -> Vec<Node> {
    urls.iter().take(MAX_NODES).map(|u| Node::from_url(u)).collect()
}

impl NodePool {
    pub fn new(config: NodePoolConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            beacon: to_nodes(&config.beacon),
            exec: to_nodes(&config.exec),
            rest: to_nodes(&config.rest),
            prover: to_nodes(&config.prover),
            checkpointz: to_nodes(&config.checkpointz),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    fn nodes_for(&self, kind: RequestKind) -> &[Node] {
        match kind {
            RequestKind::BeaconApi => &self.beacon,
            RequestKind::ExecRpc => &self.exec,
            RequestKind::RestApi => &self.rest,
            RequestKind::Prover => &self.prover,
            RequestKind::Checkpointz => &self.checkpointz,
            RequestKind::Internal => &[],
        }
    }

    async fn execute(&self, req: &DataRequest, node: &Node) -> Result<(u16, Bytes)> {
        let full_url = if req.url.is_empty() || req.kind == RequestKind::ExecRpc {
            node.url.clone()
        } else {
            format!("{}/{}", node.url, req.url.trim_start_matches('/'))
        };

        let mut builder = match req.method {
            HttpMethod::Get => self.http.get(&full_url),
            HttpMethod::Post => {
                let mut b = self.http.post(&full_url);
                if let Some(payload) = &req.payload {
                    b = b.header("Content-Type", "application/json").json(payload);
                }
                b
            }
            HttpMethod::Put => self.http.put(&full_url),
            HttpMethod::Delete => self.http.delete(&full_url),
        };
        builder = match req.encoding {
            Encoding::Ssz => builder.header("Accept", "application/octet-stream"),
            Encoding::Json => builder.header("Accept", "application/json"),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok((status, body))
    }

    /// Drive one request to completion: try nodes in preference order,
    /// classify every completion, exclude nodes on transient failures.
    /// At most one issue per node.
    pub async fn fetch(&self, req: &mut DataRequest) {
        if req.kind == RequestKind::Internal {
            req.error = Some("internal request not satisfied by host".to_string());
            return;
        }
        let nodes = self.nodes_for(req.kind);
        if nodes.is_empty() {
            req.error = Some(format!("no nodes configured for {:?}", req.kind));
            return;
        }

        let mut order: Vec<usize> = (0..nodes.len()).collect();
        if req.preferred_client_type != 0 {
            order.sort_by_key(|i| {
                if nodes[*i].client_type & req.preferred_client_type != 0 { 0 } else { 1 }
            });
        }

        let mut last_error: Option<String> = None;
        for idx in order {
            if req.node_exclude_mask & (1 << idx) != 0 {
                continue;
            }
            let node = &nodes[idx];
            match self.execute(req, node).await {
                Ok((status, body)) => {
                    match classify_response(status, &req.url, &body, req.kind) {
                        ResponseClass::Success => {
                            req.response = Some(body);
                            req.response_node_index = idx as u16;
                            return;
                        }
                        ResponseClass::ErrorRetry => {
                            debug!(url = %req.url, node = %node.url, status, "transient upstream error, excluding node");
                            req.node_exclude_mask |= 1 << idx;
                            last_error =
                                Some(format!("HTTP {} from {}: {}", status, node.url, preview(&body)));
                        }
                        ResponseClass::ErrorUser => {
                            req.error = Some(format!("user error: {}", preview(&body)));
                            req.response_node_index = idx as u16;
                            return;
                        }
                        ResponseClass::ErrorMethodNotSupported => {
                            req.error = Some(format!("method not supported: {}", preview(&body)));
                            req.response_node_index = idx as u16;
                            return;
                        }
                    }
                }
                Err(e) => {
                    // Transport failures (timeouts, DNS, TLS) are node-local.
                    warn!(url = %req.url, node = %node.url, "request failed: {}", e);
                    req.node_exclude_mask |= 1 << idx;
                    last_error = Some(e.to_string());
                }
            }
        }
        req.error = Some(last_error.unwrap_or_else(|| "all nodes excluded".to_string()));
    }

    /// Satisfy every open request in the state. Completion order carries no
    /// meaning; builders that need ordering issue one request per entry.
    pub async fn drive(&self, state: &mut RequestState) {
        let open: Vec<[u8; 32]> =
            state.open_requests_mut().map(|r| r.id).collect();
        for id in open {
            if let Some(req) = state.request_mut(&id) {
                self.fetch(req).await;
            }
        }
    }
}

fn preview(body: &[u8]) -> String {
    const LIMIT: usize = 256;
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = NodePoolConfig::new(MAINNET);
        assert!(!config.beacon.is_empty());
        assert!(!config.exec.is_empty());
        assert!(!config.prover.is_empty());
        assert_eq!(config.checkpointz.len(), 4);
    }

    #[test]
    fn test_config_overrides() {
        let config = NodePoolConfig::new(SEPOLIA)
            .with_beacon(vec!["https://beacon.test".into()])
            .with_exec(vec!["https://rpc.test/".into()]);
        let pool = NodePool::new(config);
        assert_eq!(pool.beacon[0].url, "https://beacon.test");
        assert_eq!(pool.exec[0].url, "https://rpc.test");
    }

    #[test]
    fn test_empty_override_keeps_defaults() {
        let config = NodePoolConfig::new(MAINNET).with_beacon(vec![]);
        assert!(!config.beacon.is_empty());
    }

    #[test]
    fn test_node_list_is_capped() {
        let urls: Vec<String> = (0..40).map(|i| format!("https://node{}.test", i)).collect();
        assert_eq!(to_nodes(&urls).len(), MAX_NODES);
    }

    #[test]
    fn test_lodestar_client_type() {
        let node = Node::from_url(MAINNET_BEACON_API);
        assert_eq!(node.client_type, CLIENT_TYPE_LODESTAR);
        let other = Node::from_url("https://example.com");
        assert_eq!(other.client_type, 0);
    }

    #[tokio::test]
    async fn test_fetch_with_no_nodes() {
        let pool = NodePool::new(NodePoolConfig { chain_id: 1, ..Default::default() });
        let mut req = DataRequest::get(1, RequestKind::RestApi, Encoding::Json, "/x");
        pool.fetch(&mut req).await;
        assert!(req.error.as_deref().unwrap().contains("no nodes configured"));
    }

    #[tokio::test]
    async fn test_internal_requests_are_not_fetched() {
        let pool = NodePool::new(NodePoolConfig::new(MAINNET));
        let mut req = DataRequest::get(1, RequestKind::Internal, Encoding::Ssz, "lcu?start=1");
        pool.fetch(&mut req).await;
        assert!(req.error.is_some());
    }
}
