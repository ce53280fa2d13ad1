//! End-to-end slot session flow against the in-memory block store

use async_trait::async_trait;
use qc_17_slot_production::{
    verify_vrf, Block, BlockAssembler, BlockBroadcaster, BlockRequest, BlockStore, Header,
    InMemoryBlockStore, KeyType, LocalKeystore, PreDigest, Result, SessionPorts, SlotKey,
    SlotProducerService, SlotProductionConfig, SlotProductionError, SlotSession, SystemWallClock,
    TargetRate, TransactionSource, VrfInput, WallClock,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const SLOT_MS: u64 = 200;
const RANDOMNESS: [u8; 32] = [0x5A; 32];

struct NoTransactions;

#[async_trait]
impl TransactionSource for NoTransactions {
    async fn pending_transactions(&self, _max_count: u32) -> Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }
}

struct DigestOnlyAssembler;

#[async_trait]
impl BlockAssembler for DigestOnlyAssembler {
    async fn assemble_block(&self, request: BlockRequest) -> Result<Block> {
        Ok(Block {
            header: Header {
                parent_hash: request.parent.hash(),
                number: request.parent.number + 1,
                digest: vec![request.pre_digest.to_digest_item()],
            },
            body: request.transactions,
        })
    }
}

struct LocalImport {
    store: Arc<InMemoryBlockStore>,
    produced: mpsc::UnboundedSender<Block>,
}

#[async_trait]
impl BlockBroadcaster for LocalImport {
    async fn broadcast_block(&self, block: Block) -> Result<()> {
        self.store.add_block(block.clone(), SystemWallClock.now_ms())?;
        self.produced
            .send(block)
            .map_err(|e| SlotProductionError::BroadcastError(e.to_string()))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_single_authority_produces_consecutive_blocks() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("qc_17_slot_production=debug")
        .with_test_writer()
        .try_init();

    let store = Arc::new(InMemoryBlockStore::with_genesis(SystemWallClock.now_ms()));
    let keystore = Arc::new(LocalKeystore::new());
    let public = keystore.generate(KeyType::Babe);
    let (produced, mut blocks) = mpsc::unbounded_channel();

    let ports = SessionPorts::new(
        store.clone(),
        Arc::new(SlotKey::new(keystore, KeyType::Babe)),
        Arc::new(NoTransactions),
        Arc::new(DigestOnlyAssembler),
        Arc::new(LocalImport {
            store: store.clone(),
            produced,
        }),
    );
    let config = SlotProductionConfig {
        slot_duration_ms: SLOT_MS,
        target_rate: TargetRate::ALWAYS,
        ..Default::default()
    };
    let session = SlotSession::new(config, ports).unwrap();
    session.begin_epoch(0, RANDOMNESS, vec![public]).unwrap();

    SlotProducerService::start(&session).await.unwrap();

    let mut claims: Vec<PreDigest> = Vec::new();
    while claims.len() < 3 {
        let block = tokio::time::timeout(Duration::from_secs(10), blocks.recv())
            .await
            .expect("no block produced in time")
            .expect("broadcaster closed");
        let pre_digest = block
            .header
            .pre_digest()
            .unwrap()
            .expect("produced block carries a pre-digest");
        claims.push(pre_digest);
    }

    SlotProducerService::stop(&session).await.unwrap();

    assert!(claims.windows(2).all(|w| w[0].slot_number < w[1].slot_number));
    assert!(claims[0].slot_number >= 1);

    for claim in &claims {
        let decoded = PreDigest::decode(&claim.encode()).unwrap();
        assert_eq!(&decoded, claim);
        assert_eq!(decoded.authority_index, 0);

        let input = VrfInput {
            slot_number: decoded.slot_number,
            epoch_index: 0,
            randomness: RANDOMNESS,
        };
        assert!(verify_vrf(&public, &input, &decoded.claim()).unwrap());

        let cached = session.slot_claim(decoded.slot_number).await;
        assert_eq!(cached, Some(Some(decoded.claim())));
    }

    let best = store.header(&store.best_block_hash().unwrap()).unwrap();
    assert!(best.number >= 3);

    let status = session.status();
    assert!(!status.active);
    assert!(status.blocks_produced >= 2);
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_session_without_epoch_waits() {
    let store = Arc::new(InMemoryBlockStore::with_genesis(SystemWallClock.now_ms()));
    let keystore = Arc::new(LocalKeystore::new());
    keystore.generate(KeyType::Babe);
    let (produced, mut blocks) = mpsc::unbounded_channel();

    let ports = SessionPorts::new(
        store.clone(),
        Arc::new(SlotKey::new(keystore, KeyType::Babe)),
        Arc::new(NoTransactions),
        Arc::new(DigestOnlyAssembler),
        Arc::new(LocalImport { store, produced }),
    );
    let config = SlotProductionConfig {
        slot_duration_ms: 50,
        target_rate: TargetRate::ALWAYS,
        ..Default::default()
    };
    let session = SlotSession::new(config, ports).unwrap();

    session.start().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    let status = session.status();
    assert!(status.active, "missing epoch data must not stop the ticker");
    assert_eq!(status.current_epoch, None);
    assert_eq!(status.slots_evaluated, 0);
    assert!(blocks.try_recv().is_err());

    session.stop().await.unwrap();
}
