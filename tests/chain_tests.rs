//! End-to-end chain lifecycle tests
//!
//! Each scenario drives the public API the way a node binary would:
//! load a deployment document, install genesis, publish blocks, restart,
//! and run the integrity sweep.

use std::sync::atomic::AtomicBool;

use vela_core::chain::Blockchain;
use vela_core::coin::{Block, SignedBlock, Transaction, DROPLET_MULTIPLIER};
use vela_core::config::{GenesisBlockConfig, GenesisConfig, NodeConfig};
use vela_core::crypto::{Address, SecretKey};
use vela_core::integrity::{
    check_database, check_db_version, should_verify, IntegrityError,
};
use vela_core::params::{self, VerifyTxn};
use vela_core::storage::ChainDb;

const GENESIS_TIME: u64 = 1_578_207_105;
const GENESIS_COINS: u64 = 1_000_000 * DROPLET_MULTIPLIER;

struct Deployment {
    authority: SecretKey,
    owner: SecretKey,
    node: NodeConfig,
}

/// Generate a deployment document the way a genesis ceremony would, then
/// load it back through the config layer
fn deployment() -> Deployment {
    let authority = SecretKey::generate();
    let owner = SecretKey::generate();
    let address = Address::from_pubkey(&owner.public_key());
    let block = Block::genesis(address, GENESIS_COINS, GENESIS_TIME);
    let signed = SignedBlock::sign(block.clone(), &authority);

    let document = GenesisConfig {
        master_public_key: authority.public_key().to_hex(),
        genesis_signature: hex::encode(signed.sig.0),
        genesis_block: GenesisBlockConfig {
            address: address.encode(),
            coins: GENESIS_COINS,
            timestamp: GENESIS_TIME,
            body_hash: block.body.hash().to_hex(),
            header_hash: block.head.hash().to_hex(),
        },
        coin_code: "VLA".into(),
        trusted_peers: vec!["198.51.100.7:6000".into()],
    };

    // Round-trip through serialization as if read from disk
    let text = serde_json::to_string(&document).unwrap();
    let parsed: GenesisConfig = serde_json::from_str(&text).unwrap();
    let node = NodeConfig::builder(parsed)
        .ruleset(VerifyTxn::user_defaults())
        .publisher(authority.clone())
        .build()
        .unwrap();

    Deployment {
        authority,
        owner,
        node,
    }
}

fn open_chain(path: &std::path::Path, dep: &Deployment) -> Blockchain {
    let db = ChainDb::open(path).unwrap();
    Blockchain::open(
        db,
        dep.node.authority,
        dep.node.ruleset,
        dep.node.max_block_transactions_size,
    )
    .unwrap()
}

fn spend_first_output(chain: &Blockchain, owner: &SecretKey) -> Transaction {
    let addr = Address::from_pubkey(&owner.public_key());
    let ux = *chain.snapshot().owned_by(&addr)[0];
    let mut txn = Transaction::new();
    txn.push_input(ux.id()).unwrap();
    txn.push_output(addr, ux.body.coins, 0);
    txn.sign_inputs(&[owner.clone()]).unwrap();
    txn
}

#[test]
fn test_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain");
    let dep = deployment();

    // Bootstrap from the deployment document and grow the chain
    {
        let mut chain = open_chain(&path, &dep);
        assert!(chain.is_empty());
        chain.init_genesis(&dep.node.genesis).unwrap();

        let publisher = dep.node.publisher.as_ref().unwrap();
        for i in 1..=5u64 {
            let now = GENESIS_TIME + 3600 * i;
            let txn = spend_first_output(&chain, &dep.owner);
            chain.publish_block(&[txn], now, publisher).unwrap();
        }
        assert_eq!(chain.head().unwrap().seq, 5);
    }

    // Restart replays to the same head
    let chain = open_chain(&path, &dep);
    assert_eq!(chain.head().unwrap().seq, 5);

    // The integrity sweep agrees with the live ledger, twice over
    let quit = AtomicBool::new(false);
    let first = check_database(
        chain.db(),
        &dep.node.authority,
        &dep.node.ruleset,
        dep.node.max_block_transactions_size,
        &quit,
    )
    .unwrap();
    let second = check_database(
        chain.db(),
        &dep.node.authority,
        &dep.node.ruleset,
        dep.node.max_block_transactions_size,
        &quit,
    )
    .unwrap();
    assert_eq!(first.snapshot(), chain.snapshot());
    assert_eq!(first.snapshot(), second.snapshot());
}

#[test]
fn test_sweep_detects_history_rewrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain");
    let dep = deployment();

    {
        let mut chain = open_chain(&path, &dep);
        chain.init_genesis(&dep.node.genesis).unwrap();
        for i in 1..=3u64 {
            let now = GENESIS_TIME + 3600 * i;
            let txn = spend_first_output(&chain, &dep.owner);
            chain.publish_block(&[txn], now, &dep.authority).unwrap();
        }
    }

    // Rewrite block 2's stated fee without the authority's signature
    {
        let db = ChainDb::open(&path).unwrap();
        let mut signed = db.get_block(2).unwrap().unwrap();
        signed.block.head.fee += 1;
        db.save_block(&signed).unwrap();
    }

    let db = ChainDb::open(&path).unwrap();
    let quit = AtomicBool::new(false);
    let result = check_database(
        &db,
        &dep.node.authority,
        &dep.node.ruleset,
        dep.node.max_block_transactions_size,
        &quit,
    );
    assert!(matches!(
        result,
        Err(IntegrityError::Corrupt { seq: 2, .. })
    ));
}

#[test]
fn test_version_gate_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain");
    let dep = deployment();

    let app = semver::Version::parse("0.2.1").unwrap();

    {
        let mut chain = open_chain(&path, &dep);
        chain.init_genesis(&dep.node.genesis).unwrap();

        // Fresh database has no recorded version; a sweep is mandatory
        assert_eq!(chain.db().version().unwrap(), None);
        assert!(should_verify(&app, None));

        let quit = AtomicBool::new(false);
        check_database(
            chain.db(),
            &dep.node.authority,
            &dep.node.ruleset,
            dep.node.max_block_transactions_size,
            &quit,
        )
        .unwrap();
        chain.db().set_version(&app).unwrap();
    }

    // After a clean sweep the recorded version suppresses the next one
    let db = ChainDb::open(&path).unwrap();
    let recorded = db.version().unwrap().unwrap();
    check_db_version(&app, &recorded).unwrap();
    assert!(!should_verify(&app, Some(&recorded)));

    // A downgraded application refuses the database outright
    let older = semver::Version::parse("0.1.0").unwrap();
    assert!(check_db_version(&older, &recorded).is_err());
}

#[test]
fn test_sweep_respects_configured_ruleset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain");
    let dep = deployment();

    // Publish a block burning exactly the minimum under the default
    // burn factor of 10: one hour of accrual on the whole supply yields
    // 1,000,000 hours, of which 100,000 must burn
    {
        let mut chain = open_chain(&path, &dep);
        chain.init_genesis(&dep.node.genesis).unwrap();

        let now = GENESIS_TIME + 3600;
        let addr = Address::from_pubkey(&dep.owner.public_key());
        let ux = *chain.snapshot().owned_by(&addr)[0];
        let mut txn = Transaction::new();
        txn.push_input(ux.id()).unwrap();
        txn.push_output(addr, ux.body.coins, 900_000);
        txn.sign_inputs(&[dep.owner.clone()]).unwrap();
        chain.publish_block(&[txn], now, &dep.authority).unwrap();
    }

    // A lower burn factor demands a larger burn and retroactively fails
    // the stored block
    let strict = VerifyTxn {
        burn_factor: params::MIN_BURN_FACTOR,
        ..VerifyTxn::user_defaults()
    };
    let db = ChainDb::open(&path).unwrap();
    let quit = AtomicBool::new(false);
    let result = check_database(
        &db,
        &dep.node.authority,
        &strict,
        dep.node.max_block_transactions_size,
        &quit,
    );
    assert!(matches!(result, Err(IntegrityError::Corrupt { seq: 1, .. })));
}
