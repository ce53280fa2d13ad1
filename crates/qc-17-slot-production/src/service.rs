//! Slot session driver
//!
//! The session owns the slot clock, the lottery engine and the proof cache.
//! A single ticker task wakes at every slot boundary, runs the lottery for
//! the current slot and hands won slots to the assembly pipeline on a
//! separate task so the ticker never waits on assembly or broadcast.

use crate::{
    config::SlotProductionConfig,
    domain::{
        AuthorityId, EpochData, LotteryEngine, OutputAndProof, PreDigest, SlotClock,
        ThresholdManager,
    },
    error::{Result, SlotProductionError},
    events::{BlockProducedEvent, SlotClaimedEvent, BLOCK_PRODUCED_TOPIC, SLOT_CLAIMED_TOPIC},
    metrics::Metrics,
    ports::{
        BlockAssembler, BlockBroadcaster, BlockRequest, BlockStore, EventPublisher, KeySource,
        SessionStatus, SlotProducerService, SystemWallClock, TransactionSource, WallClock,
    },
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

/// Result of handling one slot
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Slot won; a block is being assembled with this pre-digest
    Claimed(PreDigest),
    /// Slot evaluated and lost
    NotLeader,
    /// Slot already handled or not after the best block's slot
    Skipped,
}

/// Collaborators a session is wired to
#[derive(Clone)]
pub struct SessionPorts {
    /// Block store
    pub store: Arc<dyn BlockStore>,
    /// Local authority key
    pub key: Arc<dyn KeySource>,
    /// Pending transaction source
    pub transactions: Arc<dyn TransactionSource>,
    /// Block assembly pipeline
    pub assembler: Arc<dyn BlockAssembler>,
    /// Import and broadcast path
    pub broadcaster: Arc<dyn BlockBroadcaster>,
    /// Wall clock
    pub wall_clock: Arc<dyn WallClock>,
    /// Optional event sink
    pub publisher: Option<Arc<dyn EventPublisher>>,
}

impl SessionPorts {
    /// Wire the required ports; uses the system clock and no event sink
    pub fn new(
        store: Arc<dyn BlockStore>,
        key: Arc<dyn KeySource>,
        transactions: Arc<dyn TransactionSource>,
        assembler: Arc<dyn BlockAssembler>,
        broadcaster: Arc<dyn BlockBroadcaster>,
    ) -> Self {
        Self {
            store,
            key,
            transactions,
            assembler,
            broadcaster,
            wall_clock: Arc::new(SystemWallClock),
            publisher: None,
        }
    }

    /// Replace the wall clock
    pub fn with_wall_clock(mut self, wall_clock: Arc<dyn WallClock>) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    /// Publish session events to `publisher`
    pub fn with_event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }
}

#[derive(Default)]
struct SessionState {
    last_handled_slot: Option<u64>,
    last_claimed_slot: Option<u64>,
    last_error: Option<String>,
}

struct SessionCore {
    config: SlotProductionConfig,
    store: Arc<dyn BlockStore>,
    clock: SlotClock,
    lottery: LotteryEngine,
    transactions: Arc<dyn TransactionSource>,
    assembler: Arc<dyn BlockAssembler>,
    broadcaster: Arc<dyn BlockBroadcaster>,
    publisher: Option<Arc<dyn EventPublisher>>,
    metrics: Arc<Metrics>,
    state: RwLock<SessionState>,
    active: AtomicBool,
}

struct Ticker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Slot-based block production session
pub struct SlotSession {
    core: Arc<SessionCore>,
    ticker: Mutex<Option<Ticker>>,
}

impl SlotSession {
    /// Create a session; the ticker is not started
    pub fn new(config: SlotProductionConfig, ports: SessionPorts) -> Result<Self> {
        config.validate()?;

        info!("[qc-17] Initializing Slot Production Session");
        info!("  Slot duration: {} ms", config.slot_duration_ms);
        info!("  Epoch length: {} slots", config.epoch_length);
        info!(
            "  Target rate: {}/{}",
            config.target_rate.numerator, config.target_rate.denominator
        );

        let metrics = Arc::new(Metrics::new());
        let clock = SlotClock::new(
            Arc::clone(&ports.store),
            ports.wall_clock,
            config.slot_duration_ms,
            config.slot_lookback,
        )?;
        let thresholds = Arc::new(ThresholdManager::new(config.target_rate)?);
        let lottery = LotteryEngine::new(ports.key, thresholds, Arc::clone(&metrics));

        Ok(Self {
            core: Arc::new(SessionCore {
                config,
                store: ports.store,
                clock,
                lottery,
                transactions: ports.transactions,
                assembler: ports.assembler,
                broadcaster: ports.broadcaster,
                publisher: ports.publisher,
                metrics,
                state: RwLock::new(SessionState::default()),
                active: AtomicBool::new(false),
            }),
            ticker: Mutex::new(None),
        })
    }

    /// Session configuration
    pub fn config(&self) -> &SlotProductionConfig {
        &self.core.config
    }

    /// Session metrics
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.core.metrics)
    }

    /// Slot clock
    pub fn clock(&self) -> &SlotClock {
        &self.core.clock
    }

    /// Lottery engine and proof cache
    pub fn lottery(&self) -> &LotteryEngine {
        &self.core.lottery
    }

    /// Threshold manager
    pub fn thresholds(&self) -> &Arc<ThresholdManager> {
        self.core.lottery.thresholds()
    }

    /// Start a new epoch
    pub fn begin_epoch(
        &self,
        epoch_index: u64,
        randomness: [u8; 32],
        authorities: Vec<AuthorityId>,
    ) -> Result<Arc<EpochData>> {
        self.thresholds()
            .begin_epoch(epoch_index, randomness, authorities)
    }

    /// Handle one slot: run the lottery and, if won, hand a block request
    /// to the assembly pipeline
    ///
    /// Slots at or below the last handled slot, and slots not after the
    /// best block's slot, are skipped.
    pub async fn handle_slot(&self, slot_number: u64) -> Result<SlotOutcome> {
        self.core.handle_slot(slot_number).await
    }

    /// Start the slot ticker
    pub fn start(&self) -> Result<()> {
        let mut ticker = self.ticker.lock();
        if let Some(running) = ticker.as_ref() {
            if !running.handle.is_finished() {
                return Err(SlotProductionError::AlreadyRunning);
            }
        }

        info!("[qc-17] Starting slot production");
        let (shutdown, receiver) = watch::channel(false);
        self.core.active.store(true, Ordering::SeqCst);
        self.core.state.write().last_error = None;
        let core = Arc::clone(&self.core);
        let handle = tokio::spawn(async move { core.run(receiver).await });

        *ticker = Some(Ticker { shutdown, handle });
        Ok(())
    }

    /// Stop the slot ticker and wait for it to exit
    pub async fn stop(&self) -> Result<()> {
        let ticker = self
            .ticker
            .lock()
            .take()
            .ok_or(SlotProductionError::NotActive)?;

        info!("[qc-17] Stopping slot production");
        // The ticker may already have exited on a fatal error.
        let _ = ticker.shutdown.send(true);
        ticker
            .handle
            .await
            .map_err(|e| SlotProductionError::InternalError(format!("slot ticker: {e}")))?;

        self.core.active.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Status snapshot
    pub fn status(&self) -> SessionStatus {
        let state = self.core.state.read();
        let metrics = &self.core.metrics;
        SessionStatus {
            active: self.core.active.load(Ordering::SeqCst),
            current_epoch: self
                .thresholds()
                .current()
                .ok()
                .map(|epoch| epoch.epoch_index),
            last_handled_slot: state.last_handled_slot,
            last_claimed_slot: state.last_claimed_slot,
            slots_evaluated: metrics.get_slots_evaluated(),
            slots_won: metrics.get_slots_won(),
            slots_skipped: metrics.get_slots_skipped(),
            blocks_produced: metrics.get_blocks_produced(),
            last_error: state.last_error.clone(),
        }
    }
}

impl SessionCore {
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("[qc-17] Slot ticker started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.tick().await {
                if e.is_recoverable() {
                    warn!("[qc-17] Slot skipped: {}", e);
                    self.metrics.record_skipped();
                } else if matches!(e, SlotProductionError::ThresholdUnset) {
                    warn!("[qc-17] No epoch data yet, retrying next slot");
                } else {
                    error!("[qc-17] Slot ticker stopped: {}", e);
                    self.state.write().last_error = Some(e.to_string());
                    break;
                }
            }

            let delay = self.until_next_slot();
            trace!("[qc-17] Sleeping {:?} until next slot", delay);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        self.active.store(false, Ordering::SeqCst);
        info!("[qc-17] Slot ticker stopped");
    }

    async fn tick(self: &Arc<Self>) -> Result<()> {
        let current = self.clock.current_slot()?;
        match self.handle_slot(current).await? {
            SlotOutcome::Claimed(pre_digest) => {
                debug!("[qc-17] Slot {} claimed", pre_digest.slot_number);
            }
            SlotOutcome::NotLeader | SlotOutcome::Skipped => {}
        }
        Ok(())
    }

    fn until_next_slot(&self) -> Duration {
        let duration = self.config.slot_duration_ms;
        let floor = (duration / 10).max(1);
        let wait = self
            .clock
            .current_slot()
            .and_then(|current| self.clock.slot_start(current.saturating_add(1)))
            .map(|next| next.saturating_sub(self.clock.now()))
            .unwrap_or(duration);
        Duration::from_millis(wait.clamp(floor, duration))
    }

    #[instrument(skip(self))]
    async fn handle_slot(self: &Arc<Self>, slot_number: u64) -> Result<SlotOutcome> {
        let best_hash = self.store.best_block_hash()?;
        let parent = self.store.header(&best_hash)?;
        let best_slot = parent.slot_number()?;

        {
            let mut state = self.state.write();
            let handled = state
                .last_handled_slot
                .is_some_and(|last| slot_number <= last);
            if handled || slot_number <= best_slot {
                trace!(
                    "[qc-17] Skipping slot {} (best slot {}, last handled {:?})",
                    slot_number,
                    best_slot,
                    state.last_handled_slot
                );
                return Ok(SlotOutcome::Skipped);
            }
            state.last_handled_slot = Some(slot_number);
        }

        if let Some(retention) = self.config.proof_cache_retention {
            self.lottery.prune_before(slot_number.saturating_sub(retention));
        }

        let slot = self.clock.slot(slot_number)?;
        let epoch = self.lottery.thresholds().current()?;
        if epoch.epoch_index != self.config.epoch_of(slot_number) {
            debug!(
                "[qc-17] Slot {} is in epoch {} but epoch {} data is active",
                slot_number,
                self.config.epoch_of(slot_number),
                epoch.epoch_index
            );
        }

        if self.lottery.run_lottery(&slot)?.is_none() {
            return Ok(SlotOutcome::NotLeader);
        }
        let pre_digest = self.lottery.build_pre_digest(&slot)?;
        self.state.write().last_claimed_slot = Some(slot_number);

        // The slot is already claimed; any source failure only costs this slot.
        let transactions = self
            .transactions
            .pending_transactions(self.config.max_block_transactions)
            .await
            .map_err(|e| {
                SlotProductionError::AssemblyError(format!("pending transactions: {e}"))
            })?;

        let correlation_id = Uuid::new_v4();
        self.publish(
            SLOT_CLAIMED_TOPIC,
            &SlotClaimedEvent::new(correlation_id, epoch.epoch_index, best_hash, &pre_digest),
        )
        .await;

        info!(
            "[qc-17] Claimed slot {} on #{} with {} transactions",
            slot_number,
            parent.number,
            transactions.len()
        );

        let request = BlockRequest {
            parent,
            slot,
            pre_digest,
            transactions,
        };
        let core = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = core.produce(request, correlation_id).await {
                warn!("[qc-17] Block production for slot {} failed: {}", slot_number, e);
            }
        });

        Ok(SlotOutcome::Claimed(pre_digest))
    }

    async fn produce(&self, request: BlockRequest, correlation_id: Uuid) -> Result<()> {
        let started = self.clock.now();
        let slot_number = request.slot.number;
        let transaction_count = request.transactions.len();

        let block = self.assembler.assemble_block(request).await?;
        let block_hash = block.hash();
        let block_number = block.header.number;
        self.broadcaster.broadcast_block(block).await?;

        self.metrics.record_block_produced(transaction_count);
        info!(
            "[qc-17] Produced block #{} {:?} for slot {}",
            block_number, block_hash, slot_number
        );

        self.publish(
            BLOCK_PRODUCED_TOPIC,
            &BlockProducedEvent {
                version: crate::events::EVENT_VERSION,
                sender_id: crate::SUBSYSTEM_ID,
                correlation_id,
                block_hash,
                block_number,
                slot_number,
                transaction_count: transaction_count as u32,
                production_time_ms: self.clock.now().saturating_sub(started),
                timestamp: Utc::now(),
            },
        )
        .await;
        Ok(())
    }

    async fn publish<E: Serialize>(&self, topic: &str, event: &E) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        match serde_json::to_vec(event) {
            Ok(payload) => {
                if let Err(e) = publisher.publish_event(topic, payload).await {
                    warn!("[qc-17] Failed to publish {}: {}", topic, e);
                }
            }
            Err(e) => warn!("[qc-17] Failed to encode {}: {}", topic, e),
        }
    }
}

#[async_trait]
impl SlotProducerService for SlotSession {
    async fn start(&self) -> Result<()> {
        SlotSession::start(self)
    }

    async fn stop(&self) -> Result<()> {
        SlotSession::stop(self).await
    }

    async fn status(&self) -> SessionStatus {
        SlotSession::status(self)
    }

    async fn slot_claim(&self, slot_number: u64) -> Option<Option<OutputAndProof>> {
        self.core.lottery.cached(slot_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBlockStore;
    use crate::domain::lottery::tests::CountingKey;
    use crate::domain::slot_clock::tests::{extend_chain, ManualClock};
    use crate::domain::{Block, EpochThreshold, Header};
    use primitive_types::H256;
    use tokio::sync::mpsc;

    struct FixedTransactions(usize);

    #[async_trait]
    impl TransactionSource for FixedTransactions {
        async fn pending_transactions(&self, max_count: u32) -> Result<Vec<Vec<u8>>> {
            Ok((0..self.0.min(max_count as usize))
                .map(|i| vec![i as u8])
                .collect())
        }
    }

    struct FailingTransactions;

    #[async_trait]
    impl TransactionSource for FailingTransactions {
        async fn pending_transactions(&self, _max_count: u32) -> Result<Vec<Vec<u8>>> {
            Err(SlotProductionError::InternalError("pool closed".into()))
        }
    }

    struct HeaderAssembler;

    #[async_trait]
    impl BlockAssembler for HeaderAssembler {
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

    struct ImportingBroadcaster {
        store: Arc<InMemoryBlockStore>,
        clock: Arc<ManualClock>,
        sent: mpsc::UnboundedSender<Block>,
    }

    #[async_trait]
    impl BlockBroadcaster for ImportingBroadcaster {
        async fn broadcast_block(&self, block: Block) -> Result<()> {
            self.store.add_block(block.clone(), self.clock.now_ms())?;
            self.sent
                .send(block)
                .map_err(|e| SlotProductionError::BroadcastError(e.to_string()))
        }
    }

    #[derive(Default)]
    struct RecordingPublisher(Mutex<Vec<String>>);

    #[async_trait]
    impl EventPublisher for RecordingPublisher {
        async fn publish_event(&self, topic: &str, _payload: Vec<u8>) -> Result<()> {
            self.0.lock().push(topic.to_string());
            Ok(())
        }
    }

    struct Harness {
        session: SlotSession,
        store: Arc<InMemoryBlockStore>,
        clock: Arc<ManualClock>,
        key: Arc<CountingKey>,
        blocks: mpsc::UnboundedReceiver<Block>,
        events: Arc<RecordingPublisher>,
    }

    const DURATION: u64 = 1_000;

    fn harness(config: SlotProductionConfig, threshold: EpochThreshold) -> Harness {
        harness_with(config, threshold, Arc::new(FixedTransactions(3)), None)
    }

    /// Harness with a chosen transaction source and, if given, an authority
    /// set that replaces the local key
    fn harness_with(
        config: SlotProductionConfig,
        threshold: EpochThreshold,
        transactions: Arc<dyn TransactionSource>,
        authorities: Option<Vec<AuthorityId>>,
    ) -> Harness {
        let store = Arc::new(InMemoryBlockStore::with_genesis(0));
        let clock = Arc::new(ManualClock::new(0));
        let key = Arc::new(CountingKey::new(1));
        let events = Arc::new(RecordingPublisher::default());
        let (sent, blocks) = mpsc::unbounded_channel();

        let ports = SessionPorts::new(
            store.clone(),
            key.clone(),
            transactions,
            Arc::new(HeaderAssembler),
            Arc::new(ImportingBroadcaster {
                store: store.clone(),
                clock: clock.clone(),
                sent,
            }),
        )
        .with_wall_clock(clock.clone())
        .with_event_publisher(events.clone());

        let session = SlotSession::new(config, ports).unwrap();
        let authorities = authorities.unwrap_or_else(|| vec![key.authority_id()]);
        session
            .thresholds()
            .force_threshold(0, [0u8; 32], authorities, threshold)
            .unwrap();

        Harness {
            session,
            store,
            clock,
            key,
            blocks,
            events,
        }
    }

    fn test_config() -> SlotProductionConfig {
        SlotProductionConfig {
            slot_duration_ms: DURATION,
            ..Default::default()
        }
    }

    async fn next_block(blocks: &mut mpsc::UnboundedReceiver<Block>) -> Block {
        tokio::time::timeout(Duration::from_secs(5), blocks.recv())
            .await
            .expect("block not broadcast in time")
            .expect("broadcaster dropped")
    }

    #[tokio::test]
    async fn test_won_slot_produces_block() {
        let mut h = harness(test_config(), EpochThreshold::always_win());
        h.clock.set(DURATION);

        let pre_digest = match h.session.handle_slot(1).await.unwrap() {
            SlotOutcome::Claimed(pre_digest) => pre_digest,
            other => panic!("expected claim, got {other:?}"),
        };
        assert_eq!(pre_digest.slot_number, 1);
        assert_eq!(pre_digest.authority_index, 0);

        let block = next_block(&mut h.blocks).await;
        assert_eq!(block.header.number, 1);
        assert_eq!(block.header.pre_digest().unwrap(), Some(pre_digest));
        assert_eq!(block.body.len(), 3);
        assert_eq!(h.store.best_block_hash().unwrap(), block.hash());

        let status = h.session.status();
        assert_eq!(status.last_claimed_slot, Some(1));
        assert_eq!(status.slots_won, 1);
    }

    #[tokio::test]
    async fn test_events_published_for_claim_and_block() {
        let mut h = harness(test_config(), EpochThreshold::always_win());
        h.clock.set(DURATION);

        h.session.handle_slot(1).await.unwrap();
        next_block(&mut h.blocks).await;

        // Block event follows the broadcast on the same task.
        tokio::time::timeout(Duration::from_secs(5), async {
            while h.events.0.lock().len() < 2 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_eq!(
            *h.events.0.lock(),
            vec![SLOT_CLAIMED_TOPIC.to_string(), BLOCK_PRODUCED_TOPIC.to_string()]
        );
    }

    #[tokio::test]
    async fn test_lost_slot() {
        let mut h = harness(test_config(), EpochThreshold::never_win());
        h.clock.set(DURATION);

        assert_eq!(h.session.handle_slot(1).await.unwrap(), SlotOutcome::NotLeader);
        assert_eq!(
            h.session.slot_claim(1).await,
            Some(None),
            "loss must be cached"
        );
        assert!(h.blocks.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_never_handles_a_slot_twice_or_backwards() {
        let h = harness(test_config(), EpochThreshold::never_win());

        assert_eq!(h.session.handle_slot(3).await.unwrap(), SlotOutcome::NotLeader);
        assert_eq!(h.session.handle_slot(3).await.unwrap(), SlotOutcome::Skipped);
        assert_eq!(h.session.handle_slot(2).await.unwrap(), SlotOutcome::Skipped);
        assert_eq!(h.key.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_production_at_or_before_best_slot() {
        let h = harness(test_config(), EpochThreshold::always_win());
        extend_chain(&h.store, &[(4, 4 * DURATION), (5, 5 * DURATION)]);

        assert_eq!(h.session.handle_slot(0).await.unwrap(), SlotOutcome::Skipped);
        assert_eq!(h.session.handle_slot(5).await.unwrap(), SlotOutcome::Skipped);
        assert_eq!(h.key.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_signing_failure_marks_slot_handled() {
        let h = harness(test_config(), EpochThreshold::always_win());
        h.key.fail.store(true, Ordering::SeqCst);

        assert!(matches!(
            h.session.handle_slot(1).await,
            Err(SlotProductionError::SigningUnavailable(_))
        ));
        assert_eq!(h.session.status().last_handled_slot, Some(1));
        assert_eq!(h.session.slot_claim(1).await, None);
    }

    #[tokio::test]
    async fn test_proof_cache_pruned_behind_current_slot() {
        let config = SlotProductionConfig {
            proof_cache_retention: Some(2),
            ..test_config()
        };
        let h = harness(config, EpochThreshold::never_win());

        for n in 1..=6 {
            h.session.handle_slot(n).await.unwrap();
        }
        assert_eq!(h.session.lottery().cached(3), None);
        assert_eq!(h.session.lottery().cached(4), Some(None));
        assert_eq!(h.session.lottery().cache_len(), 3);
    }

    #[tokio::test]
    async fn test_start_stop() {
        let h = harness(test_config(), EpochThreshold::never_win());

        assert!(matches!(
            h.session.stop().await,
            Err(SlotProductionError::NotActive)
        ));

        h.session.start().unwrap();
        assert!(h.session.status().active);
        assert!(matches!(
            h.session.start(),
            Err(SlotProductionError::AlreadyRunning)
        ));

        h.session.stop().await.unwrap();
        assert!(!h.session.status().active);
        assert_eq!(h.session.status().current_epoch, Some(0));
    }

    #[tokio::test]
    async fn test_ticker_survives_signing_failures() {
        let h = harness(test_config(), EpochThreshold::always_win());
        h.key.fail.store(true, Ordering::SeqCst);
        h.clock.set(DURATION);

        h.session.start().unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while h.session.metrics().get_slots_skipped() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        assert!(h.session.status().active);
        h.session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_key_outside_authority_set_is_not_leader() {
        let mut h = harness_with(
            test_config(),
            EpochThreshold::always_win(),
            Arc::new(FixedTransactions(3)),
            Some(vec![[9u8; 32]]),
        );
        h.clock.set(DURATION);

        assert_eq!(h.session.handle_slot(1).await.unwrap(), SlotOutcome::NotLeader);
        assert_eq!(h.session.slot_claim(1).await, Some(None));
        assert_eq!(h.key.calls.load(Ordering::SeqCst), 0);
        assert!(h.blocks.try_recv().is_err());

        h.clock.set(2 * DURATION);
        h.session.start().unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while h.session.status().last_handled_slot < Some(2) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let status = h.session.status();
        assert!(status.active);
        assert_eq!(status.slots_won, 0);
        assert_eq!(status.last_claimed_slot, None);
        assert_eq!(status.last_error, None);
        h.session.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_source_failure_skips_claimed_slot() {
        let mut h = harness_with(
            test_config(),
            EpochThreshold::always_win(),
            Arc::new(FailingTransactions),
            None,
        );
        h.clock.set(DURATION);

        let err = h.session.handle_slot(1).await.unwrap_err();
        assert!(matches!(
            err,
            SlotProductionError::AssemblyError(ref msg) if msg.contains("pool closed")
        ));
        assert!(err.is_recoverable());
        assert_eq!(h.session.status().last_claimed_slot, Some(1));
        assert!(h.blocks.try_recv().is_err());

        h.clock.set(2 * DURATION);
        h.session.start().unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while h.session.metrics().get_slots_skipped() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let status = h.session.status();
        assert!(status.active);
        assert_eq!(status.last_error, None);
        assert_eq!(status.blocks_produced, 0);
        h.session.stop().await.unwrap();
    }

    struct BrokenStore;

    impl BlockStore for BrokenStore {
        fn best_block_hash(&self) -> Result<H256> {
            Err(SlotProductionError::InternalError("index corrupted".into()))
        }
        fn header(&self, hash: &H256) -> Result<Header> {
            Err(SlotProductionError::UnknownBlock(*hash))
        }
        fn arrival_time(&self, hash: &H256) -> Result<u64> {
            Err(SlotProductionError::UnknownBlock(*hash))
        }
        fn add_block(&self, _block: Block, _arrival_time: u64) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_ticker_stops_on_structural_error() {
        let (sent, _blocks) = mpsc::unbounded_channel();
        let ports = SessionPorts::new(
            Arc::new(BrokenStore),
            Arc::new(CountingKey::new(2)),
            Arc::new(FixedTransactions(0)),
            Arc::new(HeaderAssembler),
            Arc::new(ImportingBroadcaster {
                store: Arc::new(InMemoryBlockStore::with_genesis(0)),
                clock: Arc::new(ManualClock::new(0)),
                sent,
            }),
        );
        let session = SlotSession::new(test_config(), ports).unwrap();

        session.start().unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while session.status().active {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let status = session.status();
        assert!(status.last_error.unwrap().contains("index corrupted"));
        session.stop().await.unwrap();
    }

    #[test]
    fn test_rejects_invalid_config() {
        let (sent, _blocks) = mpsc::unbounded_channel();
        let store = Arc::new(InMemoryBlockStore::with_genesis(0));
        let ports = SessionPorts::new(
            store.clone(),
            Arc::new(CountingKey::new(3)),
            Arc::new(FixedTransactions(0)),
            Arc::new(HeaderAssembler),
            Arc::new(ImportingBroadcaster {
                store,
                clock: Arc::new(ManualClock::new(0)),
                sent,
            }),
        );
        let config = SlotProductionConfig {
            slot_duration_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            SlotSession::new(config, ports),
            Err(SlotProductionError::InvalidConfig(_))
        ));
    }
}
