use colibri::{method_support, MethodSupport, Proofer};

#[test]
fn test_proofable_methods_mainnet() {
    for method in [
        "eth_getBalance",
        "eth_getTransactionCount",
        "eth_getCode",
        "eth_getStorageAt",
        "eth_getProof",
        "eth_getTransactionByHash",
        "eth_getTransactionReceipt",
        "eth_getLogs",
        "eth_getBlockByNumber",
        "eth_getBlockByHash",
        "eth_call",
        "eth_proof_sync",
    ] {
        assert_eq!(method_support(1, method), MethodSupport::Proofable, "{}", method);
    }
}

#[test]
fn test_unsupported_methods() {
    for method in ["eth_mining", "eth_coinbase", "eth_sendRawTransaction", "made_up"] {
        assert_eq!(method_support(1, method), MethodSupport::NotSupported, "{}", method);
    }
}

#[test]
fn test_op_family_subset() {
    // OP-style rollups prove blocks, transactions, receipts, logs and calls.
    assert_eq!(method_support(10, "eth_getBlockByNumber"), MethodSupport::Proofable);
    assert_eq!(method_support(8453, "eth_getTransactionReceipt"), MethodSupport::Proofable);
    assert_eq!(method_support(8453, "eth_getProof"), MethodSupport::NotSupported);
    assert_eq!(method_support(8453, "eth_proof_sync"), MethodSupport::NotSupported);
}

#[test]
fn test_unknown_chain_supports_nothing() {
    assert_eq!(method_support(424242, "eth_getBalance"), MethodSupport::NotSupported);
}

#[test]
fn test_proofer_rejects_unknown_chain() {
    assert!(Proofer::new("eth_getBalance", "[]", 424242, 0).is_err());
}

#[test]
fn test_proofer_validates_params_against_schema() {
    // Wrong param shape fails before any request is issued.
    assert!(Proofer::new("eth_getBalance", r#"[42]"#, 1, 0).is_err());
    assert!(Proofer::new(
        "eth_getBalance",
        r#"["0xde0b295669a9fd93d5f28d9ec85e40f4cb697bae"]"#,
        1,
        0
    )
    .is_ok());
}
