//! End-to-end period-store scenarios over the public API.

use std::sync::Arc;
use std::time::Duration;

use colibri::store::{FILE_BLOCKS, FILE_HEADERS, FILE_LCU};
use colibri::{NodePool, NodePoolConfig, PeriodStore, PeriodStoreConfig};

fn new_store(dir: &std::path::Path) -> PeriodStore {
    let pool = Arc::new(NodePool::new(NodePoolConfig::new(1)));
    let mut cfg = PeriodStoreConfig::new(dir, 1);
    cfg.backfill_max_periods = 0;
    PeriodStore::new(cfg, pool).unwrap()
}

async fn drain(store: &PeriodStore) {
    for _ in 0..400 {
        if store.queue_depth() == 0 {
            // One extra tick for the in-flight task.
            tokio::time::sleep(Duration::from_millis(10)).await;
            if store.queue_depth() == 0 {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue never drained");
}

#[tokio::test]
async fn test_single_head_write_lands_in_period_two() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(dir.path());

    let root = [0xa5u8; 32];
    let mut header = [0u8; 112];
    header[..8].copy_from_slice(&16507u64.to_le_bytes());
    header[16..48].copy_from_slice(&[0x5a; 32]);

    store.on_head(16507, root, header).await;
    drain(&store).await;

    let idx = 16507 % 8192;
    let blocks = std::fs::read(dir.path().join("2").join(FILE_BLOCKS)).unwrap();
    assert_eq!(&blocks[idx * 32..(idx + 1) * 32], &root);
    let headers = std::fs::read(dir.path().join("2").join(FILE_HEADERS)).unwrap();
    assert_eq!(&headers[idx * 112..(idx + 1) * 112], &header[..]);
}

#[tokio::test]
async fn test_lcu_cache_hit_owns_literal_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(dir.path());

    std::fs::create_dir_all(dir.path().join("42")).unwrap();
    std::fs::write(dir.path().join("42").join(FILE_LCU), b"LCU_PAYLOAD").unwrap();

    let bytes = store.get_light_client_updates(42, 1).await.unwrap();
    assert_eq!(bytes, b"LCU_PAYLOAD");
}

#[tokio::test]
async fn test_reorg_rewrite_is_last_write_wins() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(dir.path());

    store.on_head(20000, [0x01; 32], [1u8; 112]).await;
    store.on_head(20000, [0x02; 32], [2u8; 112]).await;
    drain(&store).await;

    let idx = 20000 % 8192;
    let blocks = std::fs::read(dir.path().join("2").join(FILE_BLOCKS)).unwrap();
    assert_eq!(&blocks[idx * 32..(idx + 1) * 32], &[0x02; 32]);
}

#[tokio::test]
async fn test_writes_across_periods_share_one_queue() {
    let dir = tempfile::tempdir().unwrap();
    let store = new_store(dir.path());

    store.on_head(8191, [0x0a; 32], [1u8; 112]).await;
    store.on_head(8192, [0x0b; 32], [2u8; 112]).await;
    store.on_head(16384, [0x0c; 32], [3u8; 112]).await;
    drain(&store).await;

    assert!(dir.path().join("0").join(FILE_BLOCKS).is_file());
    assert!(dir.path().join("1").join(FILE_BLOCKS).is_file());
    assert!(dir.path().join("2").join(FILE_BLOCKS).is_file());
    let p0 = std::fs::read(dir.path().join("0").join(FILE_BLOCKS)).unwrap();
    assert_eq!(&p0[8191 * 32..8192 * 32], &[0x0a; 32]);
}

#[test]
fn test_classifier_scenarios() {
    use colibri::types::RequestKind;
    use colibri::{classify_response, ResponseClass};

    assert_eq!(
        classify_response(
            404,
            "/eth/v1/beacon/headers/0xabc",
            b"Header not found",
            RequestKind::BeaconApi
        ),
        ResponseClass::ErrorRetry
    );
    assert_eq!(
        classify_response(
            200,
            "",
            br#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"invalid argument"}}"#,
            RequestKind::ExecRpc
        ),
        ResponseClass::ErrorUser
    );
}

#[test]
fn test_invalid_groth16_proof_length() {
    use ark_bn254::{Fr, G1Affine, G2Affine};
    use ark_ec::{AffineRepr, CurveGroup};
    use ark_ff::PrimeField;

    // A structurally fine VK; only the proof length is wrong.
    let g1 = |s: u64| {
        G1Affine::generator().mul_bigint(Fr::from(s).into_bigint()).into_affine()
    };
    let g2 = |s: u64| {
        G2Affine::generator().mul_bigint(Fr::from(s).into_bigint()).into_affine()
    };
    let g1_bytes = |p: &G1Affine| {
        use ark_ff::BigInteger;
        let mut out = p.x.into_bigint().to_bytes_be();
        out.extend(p.y.into_bigint().to_bytes_be());
        out
    };
    let g2_bytes = |p: &G2Affine| {
        use ark_ff::BigInteger;
        let mut out = p.x.c1.into_bigint().to_bytes_be();
        out.extend(p.x.c0.into_bigint().to_bytes_be());
        out.extend(p.y.c1.into_bigint().to_bytes_be());
        out.extend(p.y.c0.into_bigint().to_bytes_be());
        out
    };
    let mut vk_raw = vec![0u8; 4];
    vk_raw.extend_from_slice(&[9u8; 32]);
    vk_raw.extend(g1_bytes(&g1(1)));
    for s in [2u64, 3, 4] {
        vk_raw.extend(g2_bytes(&g2(s)));
    }
    vk_raw.extend(3u32.to_le_bytes());
    for s in [5u64, 6, 7] {
        vk_raw.extend(g1_bytes(&g1(s)));
    }
    let vk = colibri::zk::parse_vk(&vk_raw).unwrap();

    let proof = vec![0u8; 259];
    assert!(!colibri::zk::verify_proof(&vk, &proof, b"pub"));
    // Same call again: no hidden state.
    assert!(!colibri::zk::verify_proof(&vk, &proof, b"pub"));
}
