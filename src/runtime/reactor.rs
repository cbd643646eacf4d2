use std::sync::Arc;

use crate::api::error::{MirrorError, MirrorResult};
use crate::api::genesis::GenesisDoc;
use crate::api::types::{
    empty_results_hash, Block, BlockId, BlockIdentifier, ChainState, EventCollector,
};
use crate::state::client::ConcurrentEngineClient;
use crate::state::engine::InitChainRequest;
use crate::storage::chain::ChainStore;

/// Hook invoked just before a block is handed to the engine.
pub type BeforeInjectHook = Box<dyn Fn(&Block) -> MirrorResult<()> + Send + Sync>;
/// Hook invoked after a successful injection, with the collected events.
pub type AfterInjectHook = Box<dyn Fn(&Block, &EventCollector) -> MirrorResult<()> + Send + Sync>;

/// State machine sequencing genesis initialization and per-height block
/// application.
///
/// One long-lived instance per process. The lifecycle is: construct (state
/// loaded from the store, genesis unconfirmed) → `init` → `load_initial_state`
/// → repeated `inject`, one block at a time. Any injection error is fatal to
/// the caller; there is no retry state.
pub struct BlockReactor {
    client: Arc<ConcurrentEngineClient>,
    chain: ChainStore,

    // cached copies, replaced atomically on each successful injection
    last_state: ChainState,
    last_block: Option<Block>,
    evc: Option<Arc<EventCollector>>,

    run_before: Option<BeforeInjectHook>,
    run_after: Option<AfterInjectHook>,
}

impl BlockReactor {
    pub fn new(client: Arc<ConcurrentEngineClient>, chain: ChainStore) -> MirrorResult<Self> {
        let last_state = chain
            .load_state()?
            .unwrap_or_else(ChainState::uninitialized);

        Ok(Self {
            client,
            chain,
            last_state,
            last_block: None,
            evc: None,
            run_before: None,
            run_after: None,
        })
    }

    pub fn set_run_before(&mut self, hook: Option<BeforeInjectHook>) {
        self.run_before = hook;
    }

    pub fn set_run_after(&mut self, hook: Option<AfterInjectHook>) {
        self.run_after = hook;
    }

    /// Confirms genesis. When the store holds no history, constructs genesis
    /// chain state and performs the one-time handshake against the engine to
    /// establish the initial application hash. A no-op once the chain has
    /// history.
    pub fn init(&mut self, genesis: &GenesisDoc) -> MirrorResult<()> {
        tracing::info!(
            chain_id = %genesis.chain_id,
            initial_height = genesis.initial_height,
            "confirming genesis"
        );

        if self.last_state.last_block_height != 0 {
            return Ok(());
        }

        let mut genesis_state = ChainState {
            chain_id: genesis.chain_id.clone(),
            last_block_height: 0,
            initial_height: genesis.initial_height,
            app_hash: genesis.app_hash_or_zero(),
            last_results_hash: empty_results_hash(),
        };

        let engine_info = self.client.info()?;
        if engine_info.last_block_height == 0 {
            let response = self.client.init_chain(InitChainRequest {
                chain_id: genesis.chain_id.clone(),
                initial_height: genesis.initial_height,
                app_state: genesis.app_state.clone(),
            })?;
            genesis_state.app_hash = response.app_hash;
        } else {
            // the engine already holds state for this chain; adopt its hash
            genesis_state.app_hash = engine_info.last_block_app_hash;
        }

        self.chain.save_state(&genesis_state)?;
        self.last_state = genesis_state;
        Ok(())
    }

    /// Reloads cached chain state from the durable store. Must be called
    /// once after `init`, before the first `inject`. Starting from height
    /// zero seeds `last_results_hash` with the canonical empty hash.
    pub fn load_initial_state(&mut self) -> MirrorResult<()> {
        let mut state = self
            .chain
            .load_state()?
            .ok_or(MirrorError::MissingChainState)?;

        if state.last_block_height == 0 {
            state.last_results_hash = empty_results_hash();
        }
        self.last_state = state;
        Ok(())
    }

    /// Applies one block through the engine and replaces the cached state.
    ///
    /// The cached state's `app_hash` is patched to the block's declared hash
    /// before application: the engine already committed that state, and
    /// skipping the recomputation keeps injection fast. Callers must not
    /// pipeline calls; one injection at a time.
    pub fn inject(&mut self, block: Block) -> MirrorResult<()> {
        let block_id = BlockIdentifier::for_block(&block)?;

        let mut current = self.last_state.clone();
        current.app_hash = block.header.app_hash;

        // fresh collector per injection; never reused across heights
        let evc = Arc::new(EventCollector::new());
        self.client.set_event_sink(Arc::clone(&evc));

        if let Some(hook) = &self.run_before {
            hook(&block)?;
        }

        let outcome = self.client.apply_block(&current, &block_id, &block)?;
        tracing::info!(
            height = outcome.next_state.last_block_height,
            retain_height = outcome.retain_height,
            "block applied"
        );

        self.chain.save_block(&block)?;
        self.chain.save_state(&outcome.next_state)?;

        self.last_state = outcome.next_state;
        self.last_block = Some(block);
        self.evc = Some(Arc::clone(&evc));

        if let (Some(hook), Some(block)) = (&self.run_after, self.last_block.as_ref()) {
            hook(block, &evc)?;
        }
        Ok(())
    }

    /// Cached height, or `initial_height - 1` if no block was ever injected,
    /// so callers compute "next expected height" uniformly.
    pub fn current_height(&self) -> BlockId {
        if self.last_state.last_block_height != 0 {
            self.last_state.last_block_height
        } else {
            self.last_state.initial_height - 1
        }
    }

    pub fn current_block(&self) -> Option<&Block> {
        self.last_block.as_ref()
    }

    pub fn current_state(&self) -> &ChainState {
        &self.last_state
    }

    pub fn current_event_collector(&self) -> Option<Arc<EventCollector>> {
        self.evc.clone()
    }
}
