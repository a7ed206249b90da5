//! Prover orchestration.
//!
//! Every finalized checkpoint for period `p` targets period `p + 1`: verify
//! an existing proof, or assemble the guest input and spawn the guest
//! prover, then verify its output before advancing
//! `last_verified_period`. A single-permit latch prevents overlapping runs;
//! slave instances mirror their master instead of proving.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::client::NodePool;
use crate::proofer::Proofer;
use crate::shutdown;
use crate::store::{self, PeriodStore};
use crate::types::error::{ColibriError, Result};
use crate::types::request::RequestKind;
use crate::types::status::ExecStatus;

use super::groth16;

/// Minimum plausible guest input; anything shorter is regenerated.
const MIN_SYNC_INPUT_LEN: u64 = 1024;
/// Fresh failed proofs are left alone for this long before re-proving.
const RETRY_AGE: Duration = Duration::from_secs(3600);

const GUEST_BINARY: &str = "eth-sync-script";
const GUEST_FALLBACK: &str = "/app/eth-sync-script";

#[derive(Debug, Clone)]
pub struct ZkProverConfig {
    /// SP1 network private key file; proving is disabled without it.
    pub key_file: Option<PathBuf>,
    /// Guest ELF override passed through to the prover host.
    pub elf_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ProverStats {
    pub last_run_timestamp: u64,
    pub last_run_duration_ms: u64,
    pub last_run_status: i64,
    pub total_success: u64,
    pub total_failure: u64,
    pub current_period: u64,
    pub last_check_timestamp: u64,
}

pub struct ZkProver {
    store: PeriodStore,
    pool: Arc<NodePool>,
    cfg: ZkProverConfig,
    running: tokio::sync::Semaphore,
    last_verified_period: AtomicU64,
    stats: Mutex<ProverStats>,
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

impl ZkProver {
    pub fn new(store: PeriodStore, pool: Arc<NodePool>, cfg: ZkProverConfig) -> Self {
        Self {
            store,
            pool,
            cfg,
            running: tokio::sync::Semaphore::new(1),
            last_verified_period: AtomicU64::new(0),
            stats: Mutex::new(ProverStats::default()),
        }
    }

    pub fn stats(&self) -> ProverStats {
        self.stats.lock().unwrap().clone()
    }

    pub fn last_verified_period(&self) -> u64 {
        self.last_verified_period.load(Ordering::Relaxed)
    }

    /// Finalized-checkpoint entry point.
    pub async fn on_finalized_checkpoint(&self, period: u64) {
        if shutdown::in_progress() {
            return;
        }
        self.stats.lock().unwrap().last_check_timestamp = now_secs();

        // Slave instances mirror the master and never prove.
        if self.store.config().master_url.is_some() {
            if let Err(e) = self.store.full_sync_from_master().await {
                warn!("full sync from master failed: {}", e);
            }
            return;
        }
        if self.cfg.key_file.is_none() {
            debug!("no prover key configured, skipping proof generation");
            return;
        }

        let target = period + 1;
        if target <= self.last_verified_period() {
            return;
        }

        // Single-flight: a running proof wins, this checkpoint is skipped.
        let Ok(_permit) = self.running.try_acquire() else {
            debug!(period = target, "proof run already active");
            return;
        };

        match self.run_target(target).await {
            Ok(true) => info!(period = target, "period proof verified"),
            Ok(false) => debug!(period = target, "no proof action taken"),
            Err(e) => {
                warn!(period = target, "proof run failed: {}", e);
                let mut stats = self.stats.lock().unwrap();
                stats.total_failure += 1;
                stats.last_run_status = -1;
            }
        }
    }

    async fn run_target(&self, target: u64) -> Result<bool> {
        // An existing proof only needs a local check.
        let proof_path = self.store.file_path(target, store::FILE_ZK_PROOF_G16);
        let pub_path = self.store.file_path(target, store::FILE_ZK_PUB);
        if proof_path.is_file() && pub_path.is_file() {
            if self.verify_local(target).await {
                self.advance(target);
                return Ok(true);
            }
            // Do not thrash on a proof that just failed; a stale one is
            // dropped and regenerated.
            if file_age(&proof_path)? < RETRY_AGE {
                debug!(period = target, "failed proof is too fresh to retry");
                return Ok(false);
            }
            warn!(period = target, "removing stale unverifiable proof");
            let _ = tokio::fs::remove_file(&proof_path).await;
            let _ = tokio::fs::remove_file(&pub_path).await;
        }

        self.ensure_sync_input(target).await?;

        // Recursion inputs from the previous period.
        let prev_proof = self.store.file_path(target - 1, store::FILE_ZK_PROOF);
        let prev_vk = self.store.file_path(target - 1, store::FILE_ZK_VK_RAW);
        if !prev_proof.is_file() || !prev_vk.is_file() {
            return Err(ColibriError::Prover(format!(
                "missing recursion inputs for period {}",
                target - 1
            )));
        }

        let started = Instant::now();
        let exit = self.spawn_guest(target, &prev_proof, &prev_vk).await?;
        let duration = started.elapsed();

        let verified = exit == 0 && self.verify_local(target).await;
        {
            let mut stats = self.stats.lock().unwrap();
            stats.last_run_timestamp = now_secs();
            stats.last_run_duration_ms = duration.as_millis() as u64;
            stats.last_run_status = exit as i64;
            stats.current_period = target;
            if verified {
                stats.total_success += 1;
            } else {
                stats.total_failure += 1;
            }
        }
        if verified {
            self.advance(target);
        }
        Ok(verified)
    }

    fn advance(&self, target: u64) {
        self.last_verified_period.fetch_max(target, Ordering::Relaxed);
    }

    /// Check the stored Groth16 artifacts for a period. Missing or
    /// unparseable artifacts verify as false rather than erroring, so the
    /// age gate decides what happens next.
    async fn verify_local(&self, period: u64) -> bool {
        let Ok(proof) =
            tokio::fs::read(self.store.file_path(period, store::FILE_ZK_PROOF_G16)).await
        else {
            return false;
        };
        let Ok(public) = tokio::fs::read(self.store.file_path(period, store::FILE_ZK_PUB)).await
        else {
            return false;
        };
        let Ok(vk_bytes) = tokio::fs::read(self.store.file_path(period, store::FILE_ZK_VK)).await
        else {
            return false;
        };
        let Some(vk) = groth16::parse_vk(&vk_bytes) else {
            warn!(period, "stored verification key is unparseable");
            return false;
        };
        groth16::verify_proof(&vk, &proof, &public)
    }

    /// Make sure `sync.ssz` exists and is plausible, generating it through
    /// the in-process proofer when needed.
    async fn ensure_sync_input(&self, target: u64) -> Result<()> {
        let path = self.store.file_path(target, store::FILE_SYNC_INPUT);
        if tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0) >= MIN_SYNC_INPUT_LEN {
            return Ok(());
        }
        info!(period = target, "generating sync committee transition input");
        let mut proofer = Proofer::new(
            "eth_proof_sync",
            &format!("[{}]", target),
            self.store.config().chain_id,
            0,
        )?;
        loop {
            match proofer.execute() {
                ExecStatus::Success => break,
                ExecStatus::Error => {
                    return Err(ColibriError::Prover(format!(
                        "sync input generation failed: {}",
                        proofer.state.error().unwrap_or("unknown")
                    )))
                }
                ExecStatus::Pending => self.drive_requests(&mut proofer).await,
            }
        }
        let bytes = proofer
            .take_proof()
            .ok_or_else(|| ColibriError::Prover("proofer returned no bytes".into()))?;
        self.store.write_period_file(target, store::FILE_SYNC_INPUT, &bytes).await
    }

    /// Satisfy internal requests from the period store, everything else via
    /// the node pool.
    async fn drive_requests(&self, proofer: &mut Proofer) {
        let internal: Vec<([u8; 32], String)> = proofer
            .state
            .requests()
            .iter()
            .filter(|r| r.is_open() && r.kind == RequestKind::Internal)
            .map(|r| (r.id, r.url.clone()))
            .collect();
        for (id, url) in internal {
            match self.serve_internal(&url).await {
                Ok(bytes) => proofer.state.set_response(&id, bytes.into(), 0),
                Err(e) => proofer.state.set_error(&id, &e.to_string(), 0),
            }
        }
        self.pool.drive(&mut proofer.state).await;
    }

    async fn serve_internal(&self, url: &str) -> Result<Vec<u8>> {
        let query = url.strip_prefix("lcu?").ok_or_else(|| {
            ColibriError::Prover(format!("unsupported internal request '{}'", url))
        })?;
        let mut start = None;
        let mut count = 1u64;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("start_period", v)) => start = v.parse().ok(),
                Some(("count", v)) => count = v.parse().unwrap_or(1),
                _ => {}
            }
        }
        let start = start
            .ok_or_else(|| ColibriError::Prover(format!("missing start_period in '{}'", url)))?;
        self.store.get_light_client_updates(start, count).await
    }

    /// Spawn the guest prover host and stream its output into the log. The
    /// process waiter and both pipe readers are joined as one group; the
    /// run ends only when all three are done.
    async fn spawn_guest(&self, target: u64, prev_proof: &Path, prev_vk: &Path) -> Result<i32> {
        let binary = guest_binary_path();
        let key_file = self
            .cfg
            .key_file
            .as_ref()
            .ok_or_else(|| ColibriError::Prover("no prover key file".into()))?;
        let key = tokio::fs::read_to_string(key_file).await?;

        let dir = self.store.period_dir(target);
        let mut command = Command::new(&binary);
        command
            .arg("--prove")
            .arg("--groth16")
            .arg("--input-file")
            .arg(dir.join(store::FILE_SYNC_INPUT))
            .arg("--prev-proof")
            .arg(prev_proof)
            .arg("--prev-vk")
            .arg(prev_vk)
            .env("SP1_PROVER", "network")
            .env("SP1_PRIVATE_KEY", key.trim())
            .env("PROOF_OUTPUT_FILE", dir.join(store::FILE_ZK_PROOF_SSZ))
            .env("PROOF_COMPRESSED_OUTPUT_FILE", dir.join(store::FILE_ZK_PROOF))
            .env("PROOF_RAW_FILE", dir.join(store::FILE_ZK_PROOF_G16))
            .env("PUBLIC_VALUES_FILE", dir.join(store::FILE_ZK_PUB))
            .env("VK_OUTPUT_FILE", dir.join(store::FILE_ZK_VK))
            .env("VK_COMPRESSED_OUTPUT_FILE", dir.join(store::FILE_ZK_VK_RAW))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(elf) = &self.cfg.elf_path {
            command.env("ELF_PATH", elf);
        }

        info!(period = target, binary = %binary.display(), "starting guest prover");
        let mut child = command.spawn().map_err(|e| {
            ColibriError::Prover(format!("failed to spawn {}: {}", binary.display(), e))
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = tokio::spawn(async move {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    info!(target: "prover", "{}", line);
                }
            }
        });
        let err_task = tokio::spawn(async move {
            if let Some(stderr) = stderr {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "prover", "{}", line);
                }
            }
        });

        let status = child.wait().await?;
        let _ = out_task.await;
        let _ = err_task.await;
        Ok(status.code().unwrap_or(-1))
    }
}

fn guest_binary_path() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join(GUEST_BINARY);
            if sibling.is_file() {
                return sibling;
            }
        }
    }
    PathBuf::from(GUEST_FALLBACK)
}

fn file_age(path: &Path) -> Result<Duration> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(SystemTime::now().duration_since(modified).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{NodePool, NodePoolConfig};
    use crate::store::PeriodStoreConfig;

    fn test_prover(dir: &Path, master: Option<String>) -> ZkProver {
        let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
        let mut cfg = PeriodStoreConfig::new(dir, 1);
        cfg.master_url = master;
        let store = PeriodStore::new(cfg, pool.clone()).unwrap();
        ZkProver::new(
            store,
            pool,
            ZkProverConfig { key_file: None, elf_path: None },
        )
    }

    #[tokio::test]
    async fn test_checkpoint_without_key_is_noop() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let prover = test_prover(dir.path(), None);
        prover.on_finalized_checkpoint(700).await;
        assert_eq!(prover.last_verified_period(), 0);
        // The check is still recorded.
        assert!(prover.stats().last_check_timestamp > 0);
    }

    #[tokio::test]
    async fn test_verify_local_rejects_garbage() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let prover = test_prover(dir.path(), None);
        let store = &prover.store;
        store.write_period_file(5, store::FILE_ZK_PROOF_G16, &[0u8; 260]).await.unwrap();
        store.write_period_file(5, store::FILE_ZK_PUB, b"pub").await.unwrap();
        store.write_period_file(5, store::FILE_ZK_VK, b"not a vk").await.unwrap();
        assert!(!prover.verify_local(5).await);
    }

    #[tokio::test]
    async fn test_serve_internal_parses_query() {
        crate::shutdown::reset();
        let dir = tempfile::tempdir().unwrap();
        let prover = test_prover(dir.path(), None);
        prover
            .store
            .write_period_file(9, store::FILE_LCU, b"CACHED")
            .await
            .unwrap();
        let bytes = prover.serve_internal("lcu?start_period=9&count=1").await.unwrap();
        assert_eq!(bytes, b"CACHED");
        assert!(prover.serve_internal("other?x=1").await.is_err());
    }
}
