//! Authoritative SSZ type catalog: beacon-chain containers per fork, the
//! period-store manifest, and the `C4Request` proof container family.

use crate::types::chain::Fork;

use super::{Field, TypeDef};

// =============================================================================
// Basic types
// =============================================================================

pub static UINT8: TypeDef = TypeDef::Uint(1);
pub static UINT32: TypeDef = TypeDef::Uint(4);
pub static UINT64: TypeDef = TypeDef::Uint(8);
pub static UINT256: TypeDef = TypeDef::Uint(32);
pub static BOOLEAN: TypeDef = TypeDef::Boolean;
pub static BYTES4: TypeDef = TypeDef::Bytes(4);
pub static BYTES20: TypeDef = TypeDef::Bytes(20);
pub static BYTES32: TypeDef = TypeDef::Bytes(32);
pub static BYTES48: TypeDef = TypeDef::Bytes(48);
pub static BYTES96: TypeDef = TypeDef::Bytes(96);
pub static BYTES256: TypeDef = TypeDef::Bytes(256);
pub static NONE: TypeDef = TypeDef::None;

/// Period block-roots file: 8192 slots of 32 bytes.
pub static BLOCK_ROOTS: TypeDef = TypeDef::Vector(&BYTES32, 8192);

// =============================================================================
// Beacon chain containers
// =============================================================================

pub static BEACON_BLOCK_HEADER: TypeDef = TypeDef::Container(
    "BeaconBlockHeader",
    &[
        Field { name: "slot", ty: &UINT64 },
        Field { name: "proposer_index", ty: &UINT64 },
        Field { name: "parent_root", ty: &BYTES32 },
        Field { name: "state_root", ty: &BYTES32 },
        Field { name: "body_root", ty: &BYTES32 },
    ],
);

pub static SIGNED_BEACON_BLOCK_HEADER: TypeDef = TypeDef::Container(
    "SignedBeaconBlockHeader",
    &[
        Field { name: "message", ty: &BEACON_BLOCK_HEADER },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

pub static CHECKPOINT: TypeDef = TypeDef::Container(
    "Checkpoint",
    &[
        Field { name: "epoch", ty: &UINT64 },
        Field { name: "root", ty: &BYTES32 },
    ],
);

pub static ATTESTATION_DATA: TypeDef = TypeDef::Container(
    "AttestationData",
    &[
        Field { name: "slot", ty: &UINT64 },
        Field { name: "index", ty: &UINT64 },
        Field { name: "beacon_block_root", ty: &BYTES32 },
        Field { name: "source", ty: &CHECKPOINT },
        Field { name: "target", ty: &CHECKPOINT },
    ],
);

static ATTESTING_INDICES: TypeDef = TypeDef::List(&UINT64, 2048);
static ATTESTING_INDICES_ELECTRA: TypeDef = TypeDef::List(&UINT64, 131_072);

pub static INDEXED_ATTESTATION: TypeDef = TypeDef::Container(
    "IndexedAttestation",
    &[
        Field { name: "attesting_indices", ty: &ATTESTING_INDICES },
        Field { name: "data", ty: &ATTESTATION_DATA },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

pub static INDEXED_ATTESTATION_ELECTRA: TypeDef = TypeDef::Container(
    "IndexedAttestation",
    &[
        Field { name: "attesting_indices", ty: &ATTESTING_INDICES_ELECTRA },
        Field { name: "data", ty: &ATTESTATION_DATA },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

static AGGREGATION_BITS: TypeDef = TypeDef::BitList(2048);
static AGGREGATION_BITS_ELECTRA: TypeDef = TypeDef::BitList(131_072);
static COMMITTEE_BITS: TypeDef = TypeDef::BitVector(64);

pub static ATTESTATION: TypeDef = TypeDef::Container(
    "Attestation",
    &[
        Field { name: "aggregation_bits", ty: &AGGREGATION_BITS },
        Field { name: "data", ty: &ATTESTATION_DATA },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

pub static ATTESTATION_ELECTRA: TypeDef = TypeDef::Container(
    "Attestation",
    &[
        Field { name: "aggregation_bits", ty: &AGGREGATION_BITS_ELECTRA },
        Field { name: "data", ty: &ATTESTATION_DATA },
        Field { name: "signature", ty: &BYTES96 },
        Field { name: "committee_bits", ty: &COMMITTEE_BITS },
    ],
);

pub static ATTESTER_SLASHING: TypeDef = TypeDef::Container(
    "AttesterSlashing",
    &[
        Field { name: "attestation_1", ty: &INDEXED_ATTESTATION },
        Field { name: "attestation_2", ty: &INDEXED_ATTESTATION },
    ],
);

pub static ATTESTER_SLASHING_ELECTRA: TypeDef = TypeDef::Container(
    "AttesterSlashing",
    &[
        Field { name: "attestation_1", ty: &INDEXED_ATTESTATION_ELECTRA },
        Field { name: "attestation_2", ty: &INDEXED_ATTESTATION_ELECTRA },
    ],
);

pub static PROPOSER_SLASHING: TypeDef = TypeDef::Container(
    "ProposerSlashing",
    &[
        Field { name: "signed_header_1", ty: &SIGNED_BEACON_BLOCK_HEADER },
        Field { name: "signed_header_2", ty: &SIGNED_BEACON_BLOCK_HEADER },
    ],
);

pub static ETH1_DATA: TypeDef = TypeDef::Container(
    "Eth1Data",
    &[
        Field { name: "deposit_root", ty: &BYTES32 },
        Field { name: "deposit_count", ty: &UINT64 },
        Field { name: "block_hash", ty: &BYTES32 },
    ],
);

pub static DEPOSIT_DATA: TypeDef = TypeDef::Container(
    "DepositData",
    &[
        Field { name: "pubkey", ty: &BYTES48 },
        Field { name: "withdrawal_credentials", ty: &BYTES32 },
        Field { name: "amount", ty: &UINT64 },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

static DEPOSIT_PROOF: TypeDef = TypeDef::Vector(&BYTES32, 33);

pub static DEPOSIT: TypeDef = TypeDef::Container(
    "Deposit",
    &[
        Field { name: "proof", ty: &DEPOSIT_PROOF },
        Field { name: "data", ty: &DEPOSIT_DATA },
    ],
);

pub static VOLUNTARY_EXIT: TypeDef = TypeDef::Container(
    "VoluntaryExit",
    &[
        Field { name: "epoch", ty: &UINT64 },
        Field { name: "validator_index", ty: &UINT64 },
    ],
);

pub static SIGNED_VOLUNTARY_EXIT: TypeDef = TypeDef::Container(
    "SignedVoluntaryExit",
    &[
        Field { name: "message", ty: &VOLUNTARY_EXIT },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

static SYNC_COMMITTEE_BITS: TypeDef = TypeDef::BitVector(512);

pub static SYNC_AGGREGATE: TypeDef = TypeDef::Container(
    "SyncAggregate",
    &[
        Field { name: "sync_committee_bits", ty: &SYNC_COMMITTEE_BITS },
        Field { name: "sync_committee_signature", ty: &BYTES96 },
    ],
);

static SYNC_COMMITTEE_PUBKEYS: TypeDef = TypeDef::Vector(&BYTES48, 512);

pub static SYNC_COMMITTEE: TypeDef = TypeDef::Container(
    "SyncCommittee",
    &[
        Field { name: "pubkeys", ty: &SYNC_COMMITTEE_PUBKEYS },
        Field { name: "aggregate_pubkey", ty: &BYTES48 },
    ],
);

pub static BLS_TO_EXECUTION_CHANGE: TypeDef = TypeDef::Container(
    "BLSToExecutionChange",
    &[
        Field { name: "validator_index", ty: &UINT64 },
        Field { name: "from_bls_pubkey", ty: &BYTES48 },
        Field { name: "to_execution_address", ty: &BYTES20 },
    ],
);

pub static SIGNED_BLS_TO_EXECUTION_CHANGE: TypeDef = TypeDef::Container(
    "SignedBLSToExecutionChange",
    &[
        Field { name: "message", ty: &BLS_TO_EXECUTION_CHANGE },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

pub static WITHDRAWAL: TypeDef = TypeDef::Container(
    "Withdrawal",
    &[
        Field { name: "index", ty: &UINT64 },
        Field { name: "validator_index", ty: &UINT64 },
        Field { name: "address", ty: &BYTES20 },
        Field { name: "amount", ty: &UINT64 },
    ],
);

static EXTRA_DATA: TypeDef = TypeDef::ByteList(32);
static TRANSACTION: TypeDef = TypeDef::ByteList(1_073_741_824);
static TRANSACTIONS: TypeDef = TypeDef::List(&TRANSACTION, 1_048_576);
static WITHDRAWALS: TypeDef = TypeDef::List(&WITHDRAWAL, 16);

pub static EXECUTION_PAYLOAD: TypeDef = TypeDef::Container(
    "ExecutionPayload",
    &[
        Field { name: "parent_hash", ty: &BYTES32 },
        Field { name: "fee_recipient", ty: &BYTES20 },
        Field { name: "state_root", ty: &BYTES32 },
        Field { name: "receipts_root", ty: &BYTES32 },
        Field { name: "logs_bloom", ty: &BYTES256 },
        Field { name: "prev_randao", ty: &BYTES32 },
        Field { name: "block_number", ty: &UINT64 },
        Field { name: "gas_limit", ty: &UINT64 },
        Field { name: "gas_used", ty: &UINT64 },
        Field { name: "timestamp", ty: &UINT64 },
        Field { name: "extra_data", ty: &EXTRA_DATA },
        Field { name: "base_fee_per_gas", ty: &UINT256 },
        Field { name: "block_hash", ty: &BYTES32 },
        Field { name: "transactions", ty: &TRANSACTIONS },
        Field { name: "withdrawals", ty: &WITHDRAWALS },
        Field { name: "blob_gas_used", ty: &UINT64 },
        Field { name: "excess_blob_gas", ty: &UINT64 },
    ],
);

pub static EXECUTION_PAYLOAD_HEADER: TypeDef = TypeDef::Container(
    "ExecutionPayloadHeader",
    &[
        Field { name: "parent_hash", ty: &BYTES32 },
        Field { name: "fee_recipient", ty: &BYTES20 },
        Field { name: "state_root", ty: &BYTES32 },
        Field { name: "receipts_root", ty: &BYTES32 },
        Field { name: "logs_bloom", ty: &BYTES256 },
        Field { name: "prev_randao", ty: &BYTES32 },
        Field { name: "block_number", ty: &UINT64 },
        Field { name: "gas_limit", ty: &UINT64 },
        Field { name: "gas_used", ty: &UINT64 },
        Field { name: "timestamp", ty: &UINT64 },
        Field { name: "extra_data", ty: &EXTRA_DATA },
        Field { name: "base_fee_per_gas", ty: &UINT256 },
        Field { name: "block_hash", ty: &BYTES32 },
        Field { name: "transactions_root", ty: &BYTES32 },
        Field { name: "withdrawals_root", ty: &BYTES32 },
        Field { name: "blob_gas_used", ty: &UINT64 },
        Field { name: "excess_blob_gas", ty: &UINT64 },
    ],
);

pub static DEPOSIT_REQUEST: TypeDef = TypeDef::Container(
    "DepositRequest",
    &[
        Field { name: "pubkey", ty: &BYTES48 },
        Field { name: "withdrawal_credentials", ty: &BYTES32 },
        Field { name: "amount", ty: &UINT64 },
        Field { name: "signature", ty: &BYTES96 },
        Field { name: "index", ty: &UINT64 },
    ],
);

pub static WITHDRAWAL_REQUEST: TypeDef = TypeDef::Container(
    "WithdrawalRequest",
    &[
        Field { name: "source_address", ty: &BYTES20 },
        Field { name: "validator_pubkey", ty: &BYTES48 },
        Field { name: "amount", ty: &UINT64 },
    ],
);

pub static CONSOLIDATION_REQUEST: TypeDef = TypeDef::Container(
    "ConsolidationRequest",
    &[
        Field { name: "source_address", ty: &BYTES20 },
        Field { name: "source_pubkey", ty: &BYTES48 },
        Field { name: "target_pubkey", ty: &BYTES48 },
    ],
);

static DEPOSIT_REQUESTS: TypeDef = TypeDef::List(&DEPOSIT_REQUEST, 8192);
static WITHDRAWAL_REQUESTS: TypeDef = TypeDef::List(&WITHDRAWAL_REQUEST, 16);
static CONSOLIDATION_REQUESTS: TypeDef = TypeDef::List(&CONSOLIDATION_REQUEST, 2);

pub static EXECUTION_REQUESTS: TypeDef = TypeDef::Container(
    "ExecutionRequests",
    &[
        Field { name: "deposits", ty: &DEPOSIT_REQUESTS },
        Field { name: "withdrawals", ty: &WITHDRAWAL_REQUESTS },
        Field { name: "consolidations", ty: &CONSOLIDATION_REQUESTS },
    ],
);

static PROPOSER_SLASHINGS: TypeDef = TypeDef::List(&PROPOSER_SLASHING, 16);
static ATTESTER_SLASHINGS: TypeDef = TypeDef::List(&ATTESTER_SLASHING, 2);
static ATTESTER_SLASHINGS_ELECTRA: TypeDef = TypeDef::List(&ATTESTER_SLASHING_ELECTRA, 1);
static ATTESTATIONS: TypeDef = TypeDef::List(&ATTESTATION, 128);
static ATTESTATIONS_ELECTRA: TypeDef = TypeDef::List(&ATTESTATION_ELECTRA, 8);
static DEPOSITS: TypeDef = TypeDef::List(&DEPOSIT, 16);
static VOLUNTARY_EXITS: TypeDef = TypeDef::List(&SIGNED_VOLUNTARY_EXIT, 16);
static BLS_CHANGES: TypeDef = TypeDef::List(&SIGNED_BLS_TO_EXECUTION_CHANGE, 16);
static BLOB_KZG_COMMITMENTS: TypeDef = TypeDef::List(&BYTES48, 4096);

pub static BEACON_BLOCK_BODY_DENEB: TypeDef = TypeDef::Container(
    "BeaconBlockBody",
    &[
        Field { name: "randao_reveal", ty: &BYTES96 },
        Field { name: "eth1_data", ty: &ETH1_DATA },
        Field { name: "graffiti", ty: &BYTES32 },
        Field { name: "proposer_slashings", ty: &PROPOSER_SLASHINGS },
        Field { name: "attester_slashings", ty: &ATTESTER_SLASHINGS },
        Field { name: "attestations", ty: &ATTESTATIONS },
        Field { name: "deposits", ty: &DEPOSITS },
        Field { name: "voluntary_exits", ty: &VOLUNTARY_EXITS },
        Field { name: "sync_aggregate", ty: &SYNC_AGGREGATE },
        Field { name: "execution_payload", ty: &EXECUTION_PAYLOAD },
        Field { name: "bls_to_execution_changes", ty: &BLS_CHANGES },
        Field { name: "blob_kzg_commitments", ty: &BLOB_KZG_COMMITMENTS },
    ],
);

pub static BEACON_BLOCK_BODY_ELECTRA: TypeDef = TypeDef::Container(
    "BeaconBlockBody",
    &[
        Field { name: "randao_reveal", ty: &BYTES96 },
        Field { name: "eth1_data", ty: &ETH1_DATA },
        Field { name: "graffiti", ty: &BYTES32 },
        Field { name: "proposer_slashings", ty: &PROPOSER_SLASHINGS },
        Field { name: "attester_slashings", ty: &ATTESTER_SLASHINGS_ELECTRA },
        Field { name: "attestations", ty: &ATTESTATIONS_ELECTRA },
        Field { name: "deposits", ty: &DEPOSITS },
        Field { name: "voluntary_exits", ty: &VOLUNTARY_EXITS },
        Field { name: "sync_aggregate", ty: &SYNC_AGGREGATE },
        Field { name: "execution_payload", ty: &EXECUTION_PAYLOAD },
        Field { name: "bls_to_execution_changes", ty: &BLS_CHANGES },
        Field { name: "blob_kzg_commitments", ty: &BLOB_KZG_COMMITMENTS },
        Field { name: "execution_requests", ty: &EXECUTION_REQUESTS },
    ],
);

pub static BEACON_BLOCK_DENEB: TypeDef = TypeDef::Container(
    "BeaconBlock",
    &[
        Field { name: "slot", ty: &UINT64 },
        Field { name: "proposer_index", ty: &UINT64 },
        Field { name: "parent_root", ty: &BYTES32 },
        Field { name: "state_root", ty: &BYTES32 },
        Field { name: "body", ty: &BEACON_BLOCK_BODY_DENEB },
    ],
);

pub static BEACON_BLOCK_ELECTRA: TypeDef = TypeDef::Container(
    "BeaconBlock",
    &[
        Field { name: "slot", ty: &UINT64 },
        Field { name: "proposer_index", ty: &UINT64 },
        Field { name: "parent_root", ty: &BYTES32 },
        Field { name: "state_root", ty: &BYTES32 },
        Field { name: "body", ty: &BEACON_BLOCK_BODY_ELECTRA },
    ],
);

pub static SIGNED_BEACON_BLOCK_DENEB: TypeDef = TypeDef::Container(
    "SignedBeaconBlock",
    &[
        Field { name: "message", ty: &BEACON_BLOCK_DENEB },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

pub static SIGNED_BEACON_BLOCK_ELECTRA: TypeDef = TypeDef::Container(
    "SignedBeaconBlock",
    &[
        Field { name: "message", ty: &BEACON_BLOCK_ELECTRA },
        Field { name: "signature", ty: &BYTES96 },
    ],
);

// =============================================================================
// Light client containers
// =============================================================================

static EXECUTION_BRANCH: TypeDef = TypeDef::Vector(&BYTES32, 4);

pub static LIGHT_CLIENT_HEADER: TypeDef = TypeDef::Container(
    "LightClientHeader",
    &[
        Field { name: "beacon", ty: &BEACON_BLOCK_HEADER },
        Field { name: "execution", ty: &EXECUTION_PAYLOAD_HEADER },
        Field { name: "execution_branch", ty: &EXECUTION_BRANCH },
    ],
);

static NEXT_SYNC_COMMITTEE_BRANCH: TypeDef = TypeDef::Vector(&BYTES32, 5);
static NEXT_SYNC_COMMITTEE_BRANCH_ELECTRA: TypeDef = TypeDef::Vector(&BYTES32, 6);
static FINALITY_BRANCH: TypeDef = TypeDef::Vector(&BYTES32, 6);
static FINALITY_BRANCH_ELECTRA: TypeDef = TypeDef::Vector(&BYTES32, 7);

pub static LIGHT_CLIENT_UPDATE_DENEB: TypeDef = TypeDef::Container(
    "LightClientUpdate",
    &[
        Field { name: "attested_header", ty: &LIGHT_CLIENT_HEADER },
        Field { name: "next_sync_committee", ty: &SYNC_COMMITTEE },
        Field { name: "next_sync_committee_branch", ty: &NEXT_SYNC_COMMITTEE_BRANCH },
        Field { name: "finalized_header", ty: &LIGHT_CLIENT_HEADER },
        Field { name: "finality_branch", ty: &FINALITY_BRANCH },
        Field { name: "sync_aggregate", ty: &SYNC_AGGREGATE },
        Field { name: "signature_slot", ty: &UINT64 },
    ],
);

pub static LIGHT_CLIENT_UPDATE_ELECTRA: TypeDef = TypeDef::Container(
    "LightClientUpdate",
    &[
        Field { name: "attested_header", ty: &LIGHT_CLIENT_HEADER },
        Field { name: "next_sync_committee", ty: &SYNC_COMMITTEE },
        Field { name: "next_sync_committee_branch", ty: &NEXT_SYNC_COMMITTEE_BRANCH_ELECTRA },
        Field { name: "finalized_header", ty: &LIGHT_CLIENT_HEADER },
        Field { name: "finality_branch", ty: &FINALITY_BRANCH_ELECTRA },
        Field { name: "sync_aggregate", ty: &SYNC_AGGREGATE },
        Field { name: "signature_slot", ty: &UINT64 },
    ],
);

static CURRENT_SYNC_COMMITTEE_BRANCH: TypeDef = TypeDef::Vector(&BYTES32, 5);
static CURRENT_SYNC_COMMITTEE_BRANCH_ELECTRA: TypeDef = TypeDef::Vector(&BYTES32, 6);

pub static LIGHT_CLIENT_BOOTSTRAP_DENEB: TypeDef = TypeDef::Container(
    "LightClientBootstrap",
    &[
        Field { name: "header", ty: &LIGHT_CLIENT_HEADER },
        Field { name: "current_sync_committee", ty: &SYNC_COMMITTEE },
        Field { name: "current_sync_committee_branch", ty: &CURRENT_SYNC_COMMITTEE_BRANCH },
    ],
);

pub static LIGHT_CLIENT_BOOTSTRAP_ELECTRA: TypeDef = TypeDef::Container(
    "LightClientBootstrap",
    &[
        Field { name: "header", ty: &LIGHT_CLIENT_HEADER },
        Field { name: "current_sync_committee", ty: &SYNC_COMMITTEE },
        Field { name: "current_sync_committee_branch", ty: &CURRENT_SYNC_COMMITTEE_BRANCH_ELECTRA },
    ],
);

pub fn signed_beacon_block(fork: Fork) -> &'static TypeDef {
    match fork {
        Fork::Electra => &SIGNED_BEACON_BLOCK_ELECTRA,
        _ => &SIGNED_BEACON_BLOCK_DENEB,
    }
}

pub fn beacon_block_body(fork: Fork) -> &'static TypeDef {
    match fork {
        Fork::Electra => &BEACON_BLOCK_BODY_ELECTRA,
        _ => &BEACON_BLOCK_BODY_DENEB,
    }
}

pub fn light_client_update(fork: Fork) -> &'static TypeDef {
    match fork {
        Fork::Electra => &LIGHT_CLIENT_UPDATE_ELECTRA,
        _ => &LIGHT_CLIENT_UPDATE_DENEB,
    }
}

pub fn light_client_bootstrap(fork: Fork) -> &'static TypeDef {
    match fork {
        Fork::Electra => &LIGHT_CLIENT_BOOTSTRAP_ELECTRA,
        _ => &LIGHT_CLIENT_BOOTSTRAP_DENEB,
    }
}

/// Generalized index of `next_sync_committee` in the beacon state.
pub fn next_sync_committee_gindex(fork: Fork) -> u64 {
    match fork {
        Fork::Electra => 87,
        _ => 55,
    }
}

// =============================================================================
// Period-store manifest
// =============================================================================

static MANIFEST_FILENAME: TypeDef = TypeDef::ByteList(64);

pub static MANIFEST_ENTRY: TypeDef = TypeDef::Container(
    "ManifestEntry",
    &[
        Field { name: "period", ty: &UINT64 },
        Field { name: "filename", ty: &MANIFEST_FILENAME },
        Field { name: "length", ty: &UINT32 },
    ],
);

pub const MANIFEST_MAX_ENTRIES: usize = 10_000;
pub static MANIFEST: TypeDef = TypeDef::List(&MANIFEST_ENTRY, MANIFEST_MAX_ENTRIES);

// =============================================================================
// Proof containers (C4Request)
// =============================================================================

/// Serialized Patricia-trie node.
static MPT_NODE: TypeDef = TypeDef::ByteList(1_048_576);
static MPT_NODES: TypeDef = TypeDef::List(&MPT_NODE, 64);
static CODE: TypeDef = TypeDef::ByteList(16_777_216);
static DATA_BYTES_T: TypeDef = TypeDef::ByteList(16_777_216);
static PAYLOAD_BYTES: TypeDef = TypeDef::ByteList(16_777_216);
static TX_BYTES: TypeDef = TypeDef::ByteList(16_777_216);
static ADDRESS_OPT: TypeDef = TypeDef::ByteList(20);

pub static ETH_STORAGE_PROOF: TypeDef = TypeDef::Container(
    "EthStorageProof",
    &[
        Field { name: "key", ty: &BYTES32 },
        Field { name: "proof", ty: &MPT_NODES },
    ],
);

static STORAGE_PROOFS: TypeDef = TypeDef::List(&ETH_STORAGE_PROOF, 256);

pub static ETH_ACCOUNT: TypeDef = TypeDef::Container(
    "EthAccount",
    &[
        Field { name: "address", ty: &BYTES20 },
        Field { name: "proof", ty: &MPT_NODES },
        Field { name: "code", ty: &CODE },
        Field { name: "storage", ty: &STORAGE_PROOFS },
    ],
);

static STATE_WITNESSES: TypeDef = TypeDef::List(&BYTES32, 256);

/// Beacon-side anchor shared by every proof kind: the truncated header plus
/// the body multiproof witnesses for the leaves the method needs.
pub static STATE_PROOF: TypeDef = TypeDef::Container(
    "StateProof",
    &[
        Field { name: "header", ty: &BEACON_BLOCK_HEADER },
        Field { name: "proof", ty: &STATE_WITNESSES },
    ],
);

pub static ACCOUNT_PROOF: TypeDef = TypeDef::Container(
    "AccountProof",
    &[
        Field { name: "account", ty: &ETH_ACCOUNT },
        Field { name: "state_proof", ty: &STATE_PROOF },
    ],
);

pub static TRANSACTION_PROOF: TypeDef = TypeDef::Container(
    "TransactionProof",
    &[
        Field { name: "transaction", ty: &TX_BYTES },
        Field { name: "transaction_index", ty: &UINT32 },
        Field { name: "state_proof", ty: &STATE_PROOF },
    ],
);

pub static RECEIPT_PROOF: TypeDef = TypeDef::Container(
    "ReceiptProof",
    &[
        Field { name: "transaction_index", ty: &UINT32 },
        Field { name: "proof", ty: &MPT_NODES },
        Field { name: "state_proof", ty: &STATE_PROOF },
    ],
);

pub static RECEIPT_ENTRY: TypeDef = TypeDef::Container(
    "ReceiptEntry",
    &[
        Field { name: "transaction_index", ty: &UINT32 },
        Field { name: "proof", ty: &MPT_NODES },
    ],
);

static RECEIPT_ENTRIES: TypeDef = TypeDef::List(&RECEIPT_ENTRY, 256);

pub static LOGS_BLOCK: TypeDef = TypeDef::Container(
    "LogsBlock",
    &[
        Field { name: "block_number", ty: &UINT64 },
        Field { name: "receipts", ty: &RECEIPT_ENTRIES },
        Field { name: "state_proof", ty: &STATE_PROOF },
    ],
);

static LOGS_BLOCKS: TypeDef = TypeDef::List(&LOGS_BLOCK, 256);

pub static LOGS_PROOF: TypeDef = TypeDef::Container(
    "LogsProof",
    &[Field { name: "blocks", ty: &LOGS_BLOCKS }],
);

static CALL_ACCOUNTS: TypeDef = TypeDef::List(&ETH_ACCOUNT, 256);

pub static CALL_PROOF: TypeDef = TypeDef::Container(
    "CallProof",
    &[
        Field { name: "accounts", ty: &CALL_ACCOUNTS },
        Field { name: "state_proof", ty: &STATE_PROOF },
    ],
);

pub static BLOCK_PROOF: TypeDef = TypeDef::Container(
    "BlockProof",
    &[
        Field { name: "execution_payload", ty: &PAYLOAD_BYTES },
        Field { name: "state_proof", ty: &STATE_PROOF },
    ],
);

static SYNC_BRANCH: TypeDef = TypeDef::List(&BYTES32, 32);

/// Input to the sync-committee transition circuit; field layout matches what
/// the guest prover reads from `sync.ssz`.
pub static SYNC_PROOF: TypeDef = TypeDef::Container(
    "SyncProof",
    &[
        Field { name: "current_keys", ty: &SYNC_COMMITTEE_PUBKEYS },
        Field { name: "next_keys", ty: &SYNC_COMMITTEE_PUBKEYS },
        Field { name: "sync_committee_bits", ty: &SYNC_COMMITTEE_BITS },
        Field { name: "signature", ty: &BYTES96 },
        Field { name: "gindex", ty: &UINT64 },
        Field { name: "slot", ty: &UINT64 },
        Field { name: "proposer_index", ty: &UINT64 },
        Field { name: "proof", ty: &SYNC_BRANCH },
    ],
);

// Data-side containers: the JSON-shaped result the verifier re-derives.

static TOPICS: TypeDef = TypeDef::List(&BYTES32, 4);

pub static ETH_LOG: TypeDef = TypeDef::Container(
    "EthLog",
    &[
        Field { name: "address", ty: &BYTES20 },
        Field { name: "topics", ty: &TOPICS },
        Field { name: "data", ty: &DATA_BYTES_T },
        Field { name: "block_number", ty: &UINT64 },
        Field { name: "transaction_hash", ty: &BYTES32 },
        Field { name: "transaction_index", ty: &UINT32 },
        Field { name: "block_hash", ty: &BYTES32 },
        Field { name: "log_index", ty: &UINT32 },
        Field { name: "removed", ty: &BOOLEAN },
    ],
);

static LOGS: TypeDef = TypeDef::List(&ETH_LOG, 1024);

pub static ETH_TX_DATA: TypeDef = TypeDef::Container(
    "EthTxData",
    &[
        Field { name: "block_hash", ty: &BYTES32 },
        Field { name: "block_number", ty: &UINT64 },
        Field { name: "hash", ty: &BYTES32 },
        Field { name: "transaction_index", ty: &UINT32 },
        Field { name: "type", ty: &UINT8 },
        Field { name: "nonce", ty: &UINT64 },
        Field { name: "gas", ty: &UINT64 },
        Field { name: "gas_price", ty: &UINT64 },
        Field { name: "max_fee_per_gas", ty: &UINT64 },
        Field { name: "max_priority_fee_per_gas", ty: &UINT64 },
        Field { name: "value", ty: &UINT256 },
        Field { name: "input", ty: &DATA_BYTES_T },
        Field { name: "to", ty: &ADDRESS_OPT },
        Field { name: "v", ty: &UINT64 },
        Field { name: "r", ty: &BYTES32 },
        Field { name: "s", ty: &BYTES32 },
        Field { name: "chain_id", ty: &UINT64 },
    ],
);

pub static ETH_RECEIPT_DATA: TypeDef = TypeDef::Container(
    "EthReceiptData",
    &[
        Field { name: "block_hash", ty: &BYTES32 },
        Field { name: "block_number", ty: &UINT64 },
        Field { name: "transaction_hash", ty: &BYTES32 },
        Field { name: "transaction_index", ty: &UINT32 },
        Field { name: "type", ty: &UINT8 },
        Field { name: "status", ty: &UINT8 },
        Field { name: "cumulative_gas_used", ty: &UINT64 },
        Field { name: "gas_used", ty: &UINT64 },
        Field { name: "contract_address", ty: &ADDRESS_OPT },
        Field { name: "logs", ty: &LOGS },
        Field { name: "logs_bloom", ty: &BYTES256 },
        Field { name: "effective_gas_price", ty: &UINT64 },
        Field { name: "from", ty: &BYTES20 },
        Field { name: "to", ty: &ADDRESS_OPT },
    ],
);

pub static STORAGE_VALUE: TypeDef = TypeDef::Container(
    "StorageValue",
    &[
        Field { name: "key", ty: &BYTES32 },
        Field { name: "value", ty: &BYTES32 },
    ],
);

static STORAGE_VALUES: TypeDef = TypeDef::List(&STORAGE_VALUE, 256);

pub static ETH_ACCOUNT_DATA: TypeDef = TypeDef::Container(
    "EthAccountData",
    &[
        Field { name: "balance", ty: &UINT256 },
        Field { name: "nonce", ty: &UINT64 },
        Field { name: "code_hash", ty: &BYTES32 },
        Field { name: "storage_hash", ty: &BYTES32 },
        Field { name: "storage", ty: &STORAGE_VALUES },
    ],
);

pub static ETH_LOGS_DATA: TypeDef = TypeDef::List(&ETH_LOG, 1024);

pub static C4_DATA: TypeDef = TypeDef::Union(
    "C4Data",
    &[
        &NONE,
        &UINT256,
        &DATA_BYTES_T,
        &ETH_ACCOUNT_DATA,
        &ETH_TX_DATA,
        &ETH_RECEIPT_DATA,
        &ETH_LOGS_DATA,
    ],
);

pub const DATA_NONE: u8 = 0;
pub const DATA_UINT256: u8 = 1;
pub const DATA_BYTES: u8 = 2;
pub const DATA_ACCOUNT: u8 = 3;
pub const DATA_TX: u8 = 4;
pub const DATA_RECEIPT: u8 = 5;
pub const DATA_LOGS: u8 = 6;

pub static C4_PROOF: TypeDef = TypeDef::Union(
    "C4Proof",
    &[
        &NONE,
        &ACCOUNT_PROOF,
        &TRANSACTION_PROOF,
        &RECEIPT_PROOF,
        &LOGS_PROOF,
        &CALL_PROOF,
        &BLOCK_PROOF,
        &SYNC_PROOF,
    ],
);

pub const PROOF_NONE: u8 = 0;
pub const PROOF_ACCOUNT: u8 = 1;
pub const PROOF_TRANSACTION: u8 = 2;
pub const PROOF_RECEIPT: u8 = 3;
pub const PROOF_LOGS: u8 = 4;
pub const PROOF_CALL: u8 = 5;
pub const PROOF_BLOCK: u8 = 6;
pub const PROOF_SYNC: u8 = 7;

pub static SYNC_DATA: TypeDef = TypeDef::Container(
    "SyncData",
    &[
        Field { name: "sync_committee_bits", ty: &SYNC_COMMITTEE_BITS },
        Field { name: "sync_committee_signature", ty: &BYTES96 },
        Field { name: "signature_slot", ty: &UINT64 },
    ],
);

pub static C4_SYNC_DATA: TypeDef = TypeDef::Union("C4SyncData", &[&NONE, &SYNC_DATA]);

pub const SYNC_NONE: u8 = 0;
pub const SYNC_COMMITTEE_SIGNATURE: u8 = 1;

/// Wire version of the proof container.
pub const C4_VERSION: [u8; 4] = [1, 0, 0, 0];

pub static C4_REQUEST: TypeDef = TypeDef::Container(
    "C4Request",
    &[
        Field { name: "version", ty: &BYTES4 },
        Field { name: "data", ty: &C4_DATA },
        Field { name: "proof", ty: &C4_PROOF },
        Field { name: "sync_data", ty: &C4_SYNC_DATA },
    ],
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssz::{encode, Ssz, Value};

    #[test]
    fn test_header_is_fixed_112_bytes() {
        assert_eq!(BEACON_BLOCK_HEADER.fixed_size(), Some(112));
    }

    #[test]
    fn test_block_roots_vector_shape() {
        assert_eq!(BLOCK_ROOTS.fixed_size(), Some(8192 * 32));
    }

    #[test]
    fn test_sync_proof_fixed_layout() {
        // Keys, bits, signature and the three uints are all fixed; only the
        // branch list is behind an offset.
        let fixed = match &SYNC_PROOF {
            crate::ssz::TypeDef::Container(_, fields) => {
                crate::ssz::TypeDef::fixed_part_len(fields)
            }
            _ => unreachable!(),
        };
        assert_eq!(fixed, 512 * 48 * 2 + 64 + 96 + 8 + 8 + 8 + 4);
    }

    #[test]
    fn test_manifest_roundtrip() {
        let entry = |period: u64, name: &str, length: u32| {
            Value::Items(vec![
                Value::Uint(period),
                Value::Bytes(name.as_bytes().to_vec()),
                Value::Uint(length as u64),
            ])
        };
        let value = Value::Items(vec![
            entry(700, "blocks.ssz", 262144),
            entry(700, "lcu.ssz", 31337),
            entry(701, "headers.ssz", 917504),
        ]);
        let bytes = encode(&MANIFEST, &value).unwrap();
        let view = Ssz::new(&MANIFEST, &bytes);
        view.validate().unwrap();
        assert_eq!(view.len().unwrap(), 3);
        let second = view.at(1).unwrap();
        assert_eq!(second.field("period").unwrap().as_u64().unwrap(), 700);
        assert_eq!(second.field("filename").unwrap().bytes, b"lcu.ssz");
        assert_eq!(second.field("length").unwrap().as_u64().unwrap(), 31337);
    }

    #[test]
    fn test_c4_request_roundtrip() {
        let header = Value::Items(vec![
            Value::Uint(16507),
            Value::Uint(1),
            Value::Bytes(vec![0x5a; 32]),
            Value::Bytes(vec![0x11; 32]),
            Value::Bytes(vec![0x22; 32]),
        ]);
        let state_proof = Value::Items(vec![
            header,
            Value::Items(vec![Value::Bytes(vec![0xaa; 32]), Value::Bytes(vec![0xbb; 32])]),
        ]);
        let account = Value::Items(vec![
            Value::Bytes(vec![0xde; 20]),
            Value::Items(vec![Value::Bytes(vec![0x01, 0x02])]),
            Value::Bytes(vec![]),
            Value::Items(vec![]),
        ]);
        let request = Value::Items(vec![
            Value::Bytes(C4_VERSION.to_vec()),
            Value::Union(DATA_UINT256, Box::new(Value::U256([7u8; 32]))),
            Value::Union(
                PROOF_ACCOUNT,
                Box::new(Value::Items(vec![account, state_proof])),
            ),
            Value::Union(SYNC_NONE, Box::new(Value::None)),
        ]);
        let bytes = encode(&C4_REQUEST, &request).unwrap();
        let view = Ssz::new(&C4_REQUEST, &bytes);
        view.validate().unwrap();

        assert_eq!(view.field("version").unwrap().bytes, &C4_VERSION);
        let (data_kind, data) = view.field("data").unwrap().union_variant().unwrap();
        assert_eq!(data_kind, DATA_UINT256);
        assert_eq!(data.bytes, &[7u8; 32]);

        let (proof_kind, proof) = view.field("proof").unwrap().union_variant().unwrap();
        assert_eq!(proof_kind, PROOF_ACCOUNT);
        let state = proof.field("state_proof").unwrap();
        assert_eq!(
            state.field("header").unwrap().field("slot").unwrap().as_u64().unwrap(),
            16507
        );
        assert_eq!(state.field("proof").unwrap().len().unwrap(), 2);
        let acct = proof.field("account").unwrap();
        assert_eq!(acct.field("address").unwrap().bytes, &[0xde; 20]);
        assert_eq!(acct.field("proof").unwrap().at(0).unwrap().bytes, &[0x01, 0x02]);

        let (sync_kind, _) = view.field("sync_data").unwrap().union_variant().unwrap();
        assert_eq!(sync_kind, SYNC_NONE);
    }
}
