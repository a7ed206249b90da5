use sha2::{Digest, Sha256};

// =============================================================================
// Chain IDs
// =============================================================================

pub const MAINNET: u64 = 1;
pub const SEPOLIA: u64 = 11155111;
pub const HOLESKY: u64 = 17000;
pub const OP_MAINNET: u64 = 10;
pub const BASE: u64 = 8453;
pub const UNICHAIN: u64 = 130;

// =============================================================================
// Default node URLs
// =============================================================================

pub const MAINNET_ETH_RPC: &str = "https://rpc.ankr.com/eth";
pub const SEPOLIA_ETH_RPC: &str = "https://ethereum-sepolia-rpc.publicnode.com";

pub const MAINNET_BEACON_API: &str = "https://lodestar-mainnet.chainsafe.io";
pub const SEPOLIA_BEACON_API: &str = "https://ethereum-sepolia-beacon-api.publicnode.com";

pub const MAINNET_CHECKPOINTZ_1: &str = "https://sync-mainnet.beaconcha.in";
pub const MAINNET_CHECKPOINTZ_2: &str = "https://beaconstate.info";
pub const MAINNET_CHECKPOINTZ_3: &str = "https://sync.invis.tools";
pub const MAINNET_CHECKPOINTZ_4: &str = "https://beaconstate.ethstaker.cc";

pub const MAINNET_PROVER: &str = "https://mainnet1.colibri-proof.tech";
pub const SEPOLIA_PROVER: &str = "https://sepolia.colibri-proof.tech";
pub const DEFAULT_PROVER: &str = "https://c4.incubed.net";

/// Chain families the dispatcher can route for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainFamily {
    Ethereum,
    OpStack,
}

pub fn chain_family(chain_id: u64) -> Option<ChainFamily> {
    match chain_id {
        MAINNET | SEPOLIA | HOLESKY => Some(ChainFamily::Ethereum),
        OP_MAINNET | BASE | UNICHAIN => Some(ChainFamily::OpStack),
        _ => None,
    }
}

/// Consensus-layer forks in activation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Fork {
    Phase0,
    Altair,
    Bellatrix,
    Capella,
    Deneb,
    Electra,
}

#[derive(Debug, Clone, Copy)]
pub struct ForkEpoch {
    pub fork: Fork,
    pub epoch: u64,
    pub version: [u8; 4],
}

/// Beacon-chain parameters for one chain. Periods are 8192 slots
/// (256 epochs of 32 slots).
#[derive(Debug, Clone, Copy)]
pub struct ChainSpec {
    pub chain_id: u64,
    pub slots_per_epoch_bits: u32,
    pub epochs_per_period_bits: u32,
    pub genesis_validators_root: [u8; 32],
    pub forks: &'static [ForkEpoch],
}

pub const SLOTS_PER_PERIOD: u64 = 8192;

static MAINNET_FORKS: &[ForkEpoch] = &[
    ForkEpoch { fork: Fork::Phase0, epoch: 0, version: [0x00, 0x00, 0x00, 0x00] },
    ForkEpoch { fork: Fork::Altair, epoch: 74240, version: [0x01, 0x00, 0x00, 0x00] },
    ForkEpoch { fork: Fork::Bellatrix, epoch: 144896, version: [0x02, 0x00, 0x00, 0x00] },
    ForkEpoch { fork: Fork::Capella, epoch: 194048, version: [0x03, 0x00, 0x00, 0x00] },
    ForkEpoch { fork: Fork::Deneb, epoch: 269568, version: [0x04, 0x00, 0x00, 0x00] },
    ForkEpoch { fork: Fork::Electra, epoch: 364032, version: [0x05, 0x00, 0x00, 0x00] },
];

static SEPOLIA_FORKS: &[ForkEpoch] = &[
    ForkEpoch { fork: Fork::Phase0, epoch: 0, version: [0x90, 0x00, 0x00, 0x69] },
    ForkEpoch { fork: Fork::Altair, epoch: 50, version: [0x90, 0x00, 0x00, 0x70] },
    ForkEpoch { fork: Fork::Bellatrix, epoch: 100, version: [0x90, 0x00, 0x00, 0x71] },
    ForkEpoch { fork: Fork::Capella, epoch: 56832, version: [0x90, 0x00, 0x00, 0x72] },
    ForkEpoch { fork: Fork::Deneb, epoch: 132608, version: [0x90, 0x00, 0x00, 0x73] },
    ForkEpoch { fork: Fork::Electra, epoch: 222464, version: [0x90, 0x00, 0x00, 0x74] },
];

static MAINNET_SPEC: ChainSpec = ChainSpec {
    chain_id: MAINNET,
    slots_per_epoch_bits: 5,
    epochs_per_period_bits: 8,
    genesis_validators_root: [
        0x4b, 0x36, 0x3d, 0xb9, 0x4e, 0x28, 0x61, 0x20, 0xd7, 0x6e, 0xb9, 0x05, 0x34, 0x0f, 0xdd,
        0x4e, 0x54, 0xbf, 0xe9, 0xf0, 0x6b, 0xf3, 0x3f, 0xf6, 0xcf, 0x5a, 0xd2, 0x7f, 0x51, 0x1b,
        0xfe, 0x95,
    ],
    forks: MAINNET_FORKS,
};

static SEPOLIA_SPEC: ChainSpec = ChainSpec {
    chain_id: SEPOLIA,
    slots_per_epoch_bits: 5,
    epochs_per_period_bits: 8,
    genesis_validators_root: [
        0xd8, 0xea, 0x17, 0x1f, 0x3c, 0x94, 0xae, 0xa2, 0x1e, 0xbc, 0x42, 0xa1, 0xed, 0x61, 0x05,
        0x2a, 0xcf, 0x3f, 0x92, 0x09, 0xc0, 0x0e, 0x4e, 0xfb, 0xaa, 0xdd, 0xac, 0x09, 0xed, 0x9b,
        0x80, 0x78,
    ],
    forks: SEPOLIA_FORKS,
};

pub fn chain_spec(chain_id: u64) -> Option<&'static ChainSpec> {
    match chain_id {
        MAINNET => Some(&MAINNET_SPEC),
        SEPOLIA => Some(&SEPOLIA_SPEC),
        // OP-family proofs anchor on the L1 beacon chain.
        OP_MAINNET | BASE | UNICHAIN => Some(&MAINNET_SPEC),
        _ => None,
    }
}

impl ChainSpec {
    pub fn slots_per_epoch(&self) -> u64 {
        1 << self.slots_per_epoch_bits
    }

    pub fn slots_per_period(&self) -> u64 {
        1 << (self.slots_per_epoch_bits + self.epochs_per_period_bits)
    }

    pub fn period_of_slot(&self, slot: u64) -> u64 {
        slot >> (self.slots_per_epoch_bits + self.epochs_per_period_bits)
    }

    pub fn epoch_of_slot(&self, slot: u64) -> u64 {
        slot >> self.slots_per_epoch_bits
    }

    pub fn fork_at_epoch(&self, epoch: u64) -> ForkEpoch {
        let mut current = self.forks[0];
        for f in self.forks {
            if f.epoch <= epoch {
                current = *f;
            }
        }
        current
    }

    pub fn fork_at_slot(&self, slot: u64) -> ForkEpoch {
        self.fork_at_epoch(self.epoch_of_slot(slot))
    }

    pub fn fork_epoch(&self, fork: Fork) -> Option<u64> {
        self.forks.iter().find(|f| f.fork == fork).map(|f| f.epoch)
    }

    /// `hash_tree_root(ForkData { current_version, genesis_validators_root })`.
    pub fn fork_data_root(&self, version: [u8; 4]) -> [u8; 32] {
        let mut chunk = [0u8; 32];
        chunk[..4].copy_from_slice(&version);
        let mut hasher = Sha256::new();
        hasher.update(chunk);
        hasher.update(self.genesis_validators_root);
        hasher.finalize().into()
    }

    pub fn fork_digest(&self, version: [u8; 4]) -> [u8; 4] {
        let root = self.fork_data_root(version);
        [root[0], root[1], root[2], root[3]]
    }

    /// Resolve a wire fork digest back to the fork it belongs to.
    pub fn fork_for_digest(&self, digest: [u8; 4]) -> Option<Fork> {
        self.forks
            .iter()
            .find(|f| self.fork_digest(f.version) == digest)
            .map(|f| f.fork)
    }

    /// Signing domain for sync-committee messages at the given slot.
    pub fn sync_committee_domain(&self, slot: u64) -> [u8; 32] {
        const DOMAIN_SYNC_COMMITTEE: [u8; 4] = [0x07, 0x00, 0x00, 0x00];
        let version = self.fork_at_slot(slot).version;
        let root = self.fork_data_root(version);
        let mut domain = [0u8; 32];
        domain[..4].copy_from_slice(&DOMAIN_SYNC_COMMITTEE);
        domain[4..].copy_from_slice(&root[..28]);
        domain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_family() {
        assert_eq!(chain_family(MAINNET), Some(ChainFamily::Ethereum));
        assert_eq!(chain_family(BASE), Some(ChainFamily::OpStack));
        assert_eq!(chain_family(424242), None);
    }

    #[test]
    fn test_period_math() {
        let spec = chain_spec(MAINNET).unwrap();
        assert_eq!(spec.slots_per_period(), 8192);
        assert_eq!(spec.period_of_slot(8191), 0);
        assert_eq!(spec.period_of_slot(8192), 1);
        assert_eq!(spec.period_of_slot(16507), 2);
    }

    #[test]
    fn test_fork_at_slot() {
        let spec = chain_spec(MAINNET).unwrap();
        assert_eq!(spec.fork_at_slot(0).fork, Fork::Phase0);
        // Deneb activates at epoch 269568 = slot 8626176.
        assert_eq!(spec.fork_at_slot(8626176).fork, Fork::Deneb);
        assert_eq!(spec.fork_at_slot(8626175).fork, Fork::Capella);
        assert_eq!(spec.fork_at_slot(364032 << 5).fork, Fork::Electra);
    }

    #[test]
    fn test_domain_shape() {
        let spec = chain_spec(MAINNET).unwrap();
        let domain = spec.sync_committee_domain(8626176);
        assert_eq!(&domain[..4], &[0x07, 0x00, 0x00, 0x00]);
        // The remaining 28 bytes are the fork-data root prefix, never zero
        // for a real chain.
        assert!(domain[4..].iter().any(|b| *b != 0));
    }
}
