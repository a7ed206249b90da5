//! Beacon event stream: subscribes to `head` and `finalized_checkpoint`
//! topics over SSE and fans them out to the period store and the prover.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tracing::{debug, info, warn};

use colibri::types::{DataRequest, Encoding, RequestKind};
use colibri::zk::ZkProver;
use colibri::{NodePool, PeriodStore};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct EventStream {
    pub chain_id: u64,
    pub beacon_urls: Vec<String>,
    pub pool: Arc<NodePool>,
    pub store: Option<PeriodStore>,
    pub prover: Option<Arc<ZkProver>>,
}

#[derive(Debug, Deserialize)]
struct HeadEvent {
    slot: String,
    block: String,
}

#[derive(Debug, Deserialize)]
struct FinalizedEvent {
    epoch: String,
}

impl EventStream {
    pub async fn run(self) {
        if self.beacon_urls.is_empty() {
            warn!("no beacon nodes configured, event stream disabled");
            return;
        }
        let mut url_index = 0usize;
        loop {
            if colibri::shutdown::in_progress() {
                return;
            }
            let base = &self.beacon_urls[url_index % self.beacon_urls.len()];
            url_index += 1;
            let url = format!(
                "{}/eth/v1/events?topics=head,finalized_checkpoint",
                base.trim_end_matches('/')
            );
            info!(%url, "subscribing to beacon events");
            if let Err(e) = self.consume(&url).await {
                warn!("event stream ended: {}", e);
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    async fn consume(&self, url: &str) -> anyhow::Result<()> {
        let response = self
            .pool
            .http()
            .get(url)
            .header("Accept", "text/event-stream")
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("HTTP {}", response.status().as_u16());
        }

        let mut stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut event_name = String::new();
        let mut data = String::new();

        while let Some(chunk) = stream.next().await {
            if colibri::shutdown::in_progress() {
                return Ok(());
            }
            buffer.push_str(&String::from_utf8_lossy(&chunk?));
            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim_end_matches('\r').to_string();
                buffer.drain(..=newline);
                if let Some(name) = line.strip_prefix("event:") {
                    event_name = name.trim().to_string();
                } else if let Some(payload) = line.strip_prefix("data:") {
                    data = payload.trim().to_string();
                } else if line.is_empty() && !data.is_empty() {
                    self.dispatch(&event_name, &data).await;
                    event_name.clear();
                    data.clear();
                }
            }
        }
        Ok(())
    }

    async fn dispatch(&self, event: &str, data: &str) {
        match event {
            "head" => {
                let Ok(head) = serde_json::from_str::<HeadEvent>(data) else {
                    debug!("unparseable head event: {}", data);
                    return;
                };
                if let Err(e) = self.on_head(&head).await {
                    warn!(slot = %head.slot, "head handling failed: {}", e);
                }
            }
            "finalized_checkpoint" => {
                let Ok(finalized) = serde_json::from_str::<FinalizedEvent>(data) else {
                    debug!("unparseable finality event: {}", data);
                    return;
                };
                let Ok(epoch) = finalized.epoch.parse::<u64>() else {
                    return;
                };
                let spec = colibri::types::chain_spec(self.chain_id);
                let period = epoch >> spec.map(|s| s.epochs_per_period_bits).unwrap_or(8);
                info!(epoch, period, "finalized checkpoint");
                if let Some(store) = &self.store {
                    let store = store.clone();
                    tokio::spawn(async move {
                        if let Err(e) = store.fetch_historical_summaries(period).await {
                            warn!("historical summaries fetch failed: {}", e);
                        } else if let Err(e) = store.verify_blocks_roots(period).await {
                            warn!("blocks-root verification failed: {}", e);
                        }
                    });
                }
                if let Some(prover) = &self.prover {
                    prover.on_finalized_checkpoint(period).await;
                }
            }
            _ => {}
        }
    }

    /// A head event only carries slot and root; the full header comes from
    /// the headers endpoint before the store write.
    async fn on_head(&self, head: &HeadEvent) -> anyhow::Result<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let slot: u64 = head.slot.parse()?;

        let mut req = DataRequest::get(
            self.chain_id,
            RequestKind::BeaconApi,
            Encoding::Json,
            format!("/eth/v1/beacon/headers/{}", head.block),
        );
        self.pool.fetch(&mut req).await;
        if let Some(err) = req.error {
            anyhow::bail!(err);
        }
        let body = req.response.ok_or_else(|| anyhow::anyhow!("empty header response"))?;
        let json: serde_json::Value = serde_json::from_slice(&body)?;
        let message = &json["data"]["header"]["message"];

        let header = flat_header(message)?;
        let root = parse_root(&head.block)?;
        store.on_head(slot, root, header).await;
        Ok(())
    }
}

fn flat_header(message: &serde_json::Value) -> anyhow::Result<[u8; 112]> {
    let num = |v: &serde_json::Value| -> anyhow::Result<u64> {
        v.as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("bad number in header"))
    };
    let mut header = [0u8; 112];
    header[..8].copy_from_slice(&num(&message["slot"])?.to_le_bytes());
    header[8..16].copy_from_slice(&num(&message["proposer_index"])?.to_le_bytes());
    header[16..48].copy_from_slice(&parse_root(
        message["parent_root"].as_str().unwrap_or_default(),
    )?);
    header[48..80].copy_from_slice(&parse_root(
        message["state_root"].as_str().unwrap_or_default(),
    )?);
    header[80..112].copy_from_slice(&parse_root(
        message["body_root"].as_str().unwrap_or_default(),
    )?);
    Ok(header)
}

fn parse_root(s: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(s.trim_start_matches("0x"))?;
    bytes.try_into().map_err(|_| anyhow::anyhow!("root must be 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_header_layout() {
        let message = serde_json::json!({
            "slot": "16507",
            "proposer_index": "9",
            "parent_root": format!("0x{}", "5a".repeat(32)),
            "state_root": format!("0x{}", "11".repeat(32)),
            "body_root": format!("0x{}", "22".repeat(32)),
        });
        let header = flat_header(&message).unwrap();
        assert_eq!(&header[..8], &16507u64.to_le_bytes());
        assert_eq!(&header[8..16], &9u64.to_le_bytes());
        assert_eq!(&header[16..48], &[0x5a; 32]);
        assert_eq!(&header[48..80], &[0x11; 32]);
        assert_eq!(&header[80..112], &[0x22; 32]);
    }

    #[test]
    fn test_head_event_shape() {
        let data = r#"{"slot":"10","block":"0xabcd","state":"0xdef0"}"#;
        let head: HeadEvent = serde_json::from_str(data).unwrap();
        assert_eq!(head.slot, "10");
        assert_eq!(head.block, "0xabcd");
    }
}
