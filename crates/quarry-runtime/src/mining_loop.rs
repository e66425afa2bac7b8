//! [`MiningLoop`] – the autonomous mining state machine.
//!
//! # Loop body
//!
//! ```text
//! ┌─▶ offload?  ── free slots ≤ minimum ──▶ deposit into nearest chest
//! │   scan      ── sweep the window, merge unexplored sites
//! │   select    ── best score (distance / priority²)
//! │     ├─ none ──▶ expand search, rescan
//! │     └─ site ──▶ approach → hazards → equip → dig → vein → collect
//! │          └─ unreachable ──▶ skip it, select the next best
//! └── yield (loop delay) │ non-fatal error → backoff │ fatal → emergency
//! ```
//!
//! The loop runs on its own Tokio task with a fresh [`StopSignal`].
//! [`MiningLoop::stop`] raises the signal and lets the task drain to its next
//! checkpoint.  [`MiningLoop::emergency_stop`] raises the signal, aborts the
//! task outright and clears movement without waiting; whatever the in-flight
//! operation returns afterwards is ignored.
//!
//! Lifecycle signals arrive on the event bus; [`MiningLoop::watch_lifecycle`]
//! turns death, disconnect, kick, transport errors and (optionally) low
//! health into emergency stops.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use quarry_kernel::{HazardHandler, StopSignal};
use quarry_memory::{ChestRegistry, StatsSnapshot, StatsTracker};
use quarry_middleware::{EventBus, Topic};
use quarry_perception::{OreScanner, TargetSelector};
use quarry_types::{
    BlockPos, EventPayload, LifecycleSignal, MiningEvent, QuarryError, TraversalRules,
};
use quarry_world::AgentPorts;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::MiningConfig;
use crate::extraction::Extractor;
use crate::navigation::Approach;
use crate::offload::InventoryOffloadManager;
use crate::search::SearchExpander;
use crate::session::MiningSession;
use crate::state::{LoopState, Phase, StateCell};
use crate::stuck_guard::StuckGuard;
use crate::tools::ToolManager;

const SOURCE: &str = "quarry-runtime::mining_loop";

// ─────────────────────────────────────────────────────────────────────────────
// MiningLoop
// ─────────────────────────────────────────────────────────────────────────────

struct Run {
    id: u64,
    stop: StopSignal,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    config: Arc<MiningConfig>,
    ports: AgentPorts,
    bus: EventBus,
    stats: StatsTracker,
    chests: ChestRegistry,
    state: StateCell,
    is_mining: AtomicBool,
    next_run: AtomicU64,
    run: Mutex<Option<Run>>,
}

/// Handle to the mining loop.  Clones control the same loop.
#[derive(Clone)]
pub struct MiningLoop {
    inner: Arc<Inner>,
}

impl MiningLoop {
    pub fn new(
        config: MiningConfig,
        ports: AgentPorts,
        bus: EventBus,
        stats: StatsTracker,
        chests: ChestRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config: Arc::new(config),
                ports,
                bus,
                stats,
                chests,
                state: StateCell::new(),
                is_mining: AtomicBool::new(false),
                next_run: AtomicU64::new(1),
                run: Mutex::new(None),
            }),
        }
    }

    pub fn is_mining(&self) -> bool {
        self.inner.is_mining.load(Ordering::Acquire)
    }

    pub fn state(&self) -> LoopState {
        self.inner.state.get()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    pub fn chests(&self) -> &ChestRegistry {
        &self.inner.chests
    }

    /// Resolve once the loop is idle or emergency-stopped.
    pub async fn halted(&self) -> LoopState {
        self.inner.state.halted().await
    }

    fn run_slot(&self) -> MutexGuard<'_, Option<Run>> {
        self.inner.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─────────────────────────────────────────────────────────────────────
    // start / stop
    // ─────────────────────────────────────────────────────────────────────

    /// Start mining on a new task.
    ///
    /// Does nothing if a loop is already running, including one still
    /// draining after [`stop`][Self::stop].
    ///
    /// # Errors
    ///
    /// * [`QuarryError::Config`] – the configuration does not validate.
    /// * [`QuarryError::NotSpawned`] – the agent is not in the world.
    /// * [`QuarryError::NoTool`] – no item of the tool class is held.
    pub async fn start(&self) -> Result<(), QuarryError> {
        if self.is_mining() {
            info!("mining is already in progress");
            return Ok(());
        }
        let inner = &self.inner;
        inner.config.validate()?;
        if !inner.ports.presence.is_present() {
            return Err(QuarryError::NotSpawned);
        }
        ToolManager::new(inner.ports.inventory.clone())
            .equip_best_tool(&inner.config.tool_class)
            .await?;

        if inner
            .is_mining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            info!("mining is already in progress");
            return Ok(());
        }

        let id = inner.next_run.fetch_add(1, Ordering::Relaxed);
        let stop = StopSignal::new();
        inner.state.set(LoopState::Starting);
        inner.stats.begin_session();

        let worker = Worker::new(inner, stop.clone());
        let mut slot = self.run_slot();
        *slot = Some(Run {
            id,
            stop,
            task: None,
        });
        let this = self.clone();
        let task = tokio::spawn(async move {
            let outcome = worker.run().await;
            this.finish(id, outcome);
        });
        if let Some(run) = slot.as_mut() {
            run.task = Some(task);
        }
        drop(slot);

        info!(run = id, "mining started");
        inner.bus.publish_mining(SOURCE, MiningEvent::Started);
        Ok(())
    }

    /// Request a graceful stop.  Does nothing if not mining.
    ///
    /// No new navigation, dig or deposit is started once this returns; the
    /// loop task exits at its next checkpoint.
    pub fn stop(&self) {
        let slot = self.run_slot();
        let Some(run) = slot.as_ref() else {
            debug!("stop requested while not mining");
            return;
        };
        if run.stop.is_triggered() {
            return;
        }
        run.stop.trigger();
        // Set under the slot lock so `finish` cannot write Idle first.
        self.inner.state.set(LoopState::Stopping);
        drop(slot);

        self.inner.ports.navigator.stop_navigation();
        self.inner.ports.navigator.clear_movement_intent();
        info!("mining stop requested");
    }

    /// Stop immediately without draining.  Safe to call from any context;
    /// never blocks on the loop task.
    pub fn emergency_stop(&self, reason: &str) {
        self.halt(None, reason);
    }

    fn halt(&self, only_run: Option<u64>, reason: &str) {
        let run = {
            let mut slot = self.run_slot();
            match (slot.as_ref(), only_run) {
                (None, _) => None,
                (Some(run), Some(id)) if run.id != id => None,
                _ => slot.take(),
            }
        };
        let Some(run) = run else {
            debug!(reason, "emergency stop while not mining");
            return;
        };

        run.stop.trigger();
        if only_run.is_none()
            && let Some(task) = &run.task
        {
            task.abort();
        }
        let ports = &self.inner.ports;
        ports.navigator.stop_navigation();
        ports.navigator.clear_movement_intent();
        self.inner.is_mining.store(false, Ordering::Release);
        self.inner.state.set(LoopState::EmergencyStopped {
            reason: reason.to_string(),
        });
        error!(run = run.id, reason, "emergency stop");
        self.inner.bus.publish_mining(
            SOURCE,
            MiningEvent::EmergencyStopped {
                reason: reason.to_string(),
            },
        );
    }

    /// Called by the loop task when its worker returns.
    fn finish(&self, id: u64, outcome: Result<(), QuarryError>) {
        if let Err(e) = outcome {
            self.halt(Some(id), &e.to_string());
            return;
        }
        let mut slot = self.run_slot();
        if slot.as_ref().is_none_or(|run| run.id != id) {
            return;
        }
        slot.take();
        drop(slot);

        self.inner.is_mining.store(false, Ordering::Release);
        self.inner.state.set(LoopState::Idle);
        info!(run = id, "mining stopped");
        self.inner.bus.publish_mining(SOURCE, MiningEvent::Stopped);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// React to one lifecycle signal.
    pub fn on_lifecycle(&self, signal: &LifecycleSignal) {
        if let Some(reason) = signal.terminal_reason() {
            self.emergency_stop(&reason);
            return;
        }
        match signal {
            LifecycleSignal::LowHealth { health }
                if self.inner.config.stop_on_low_health
                    && *health <= self.inner.config.low_health_threshold =>
            {
                self.emergency_stop(&format!("low health ({health})"));
            }
            LifecycleSignal::Spawn => debug!("agent spawned"),
            other => debug!(?other, "lifecycle signal ignored"),
        }
    }

    /// Spawn a task that feeds lifecycle events from `bus` into
    /// [`on_lifecycle`][Self::on_lifecycle].  It ends when the bus closes;
    /// abort the handle to stop watching earlier.
    pub fn watch_lifecycle(&self, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe_to(Topic::Lifecycle);
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.next().await {
                if let EventPayload::Lifecycle(signal) = &event.payload {
                    debug!(source = %event.source, ?signal, "lifecycle event");
                    this.on_lifecycle(signal);
                }
            }
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Worker – everything owned by one run
// ─────────────────────────────────────────────────────────────────────────────

struct Worker {
    config: Arc<MiningConfig>,
    ports: AgentPorts,
    state: StateCell,
    stop: StopSignal,
    scanner: OreScanner,
    selector: TargetSelector,
    extractor: Extractor,
    expander: SearchExpander,
    offload: InventoryOffloadManager,
    guard: StuckGuard,
    session: MiningSession,
}

impl Worker {
    fn new(inner: &Inner, stop: StopSignal) -> Self {
        let config = inner.config.clone();
        let ports = inner.ports.clone();
        let table = config.priority_table();

        let hazards = Arc::new(HazardHandler::new(
            ports.world.clone(),
            ports.inventory.clone(),
            ports.interaction.clone(),
            config.hazard_policy(),
        ));
        let approach = Arc::new(Approach::new(
            ports.navigator.clone(),
            ports.presence.clone(),
            hazards.clone(),
            TraversalRules::mining(table.block_types()),
            config.navigation_timeout(),
            config.approach_tolerance,
        ));
        let extractor = Extractor {
            world: ports.world.clone(),
            presence: ports.presence.clone(),
            interaction: ports.interaction.clone(),
            tools: ToolManager::new(ports.inventory.clone()),
            hazards,
            approach: approach.clone(),
            stats: inner.stats.clone(),
            bus: inner.bus.clone(),
            state: inner.state.clone(),
            tool_class: config.tool_class.clone(),
            collect_radius: config.collect_drops.then_some(config.collect_radius),
        };
        let expander = SearchExpander::new(
            approach.clone(),
            ports.presence.clone(),
            inner.bus.clone(),
            config.search_radius_step,
            config.search_radius_max,
        );
        let offload = InventoryOffloadManager::new(
            ports.world.clone(),
            ports.presence.clone(),
            ports.inventory.clone(),
            ports.containers.clone(),
            approach,
            inner.chests.clone(),
            inner.bus.clone(),
            config.clone(),
        );

        Self {
            scanner: OreScanner::new(ports.world.clone(), table),
            selector: TargetSelector::new(),
            extractor,
            expander,
            offload,
            guard: StuckGuard::new(config.stuck_threshold),
            session: MiningSession::new(config.search_radius_initial),
            state: inner.state.clone(),
            stop,
            ports,
            config,
        }
    }

    /// Run until stopped (`Ok`) or a fatal error (`Err`).
    async fn run(mut self) -> Result<(), QuarryError> {
        loop {
            let pause = match self.iteration().await {
                Ok(()) => self.config.loop_delay(),
                Err(e) if e.is_cancellation() => break,
                Err(e) if e.is_fatal() => {
                    self.session.clear();
                    return Err(e);
                }
                Err(e) => {
                    warn!(state = %self.state.get(), error = %e, "iteration failed; backing off");
                    self.config.error_backoff()
                }
            };
            if self.stop.sleep(pause).await.is_err() {
                break;
            }
        }
        self.session.clear();
        Ok(())
    }

    async fn iteration(&mut self) -> Result<(), QuarryError> {
        self.stop.checkpoint()?;
        self.ensure_present()?;

        if self.offload.needs_offload() {
            self.state.enter(Phase::Depositing);
            match self.offload.deposit_all(&self.stop).await {
                Ok(report) => debug!(?report, "offload complete"),
                Err(e) if e.is_cancellation() || e.is_fatal() => return Err(e),
                Err(e) => warn!(error = %e, "offload skipped this cycle"),
            }
            self.stop.checkpoint()?;
        }

        self.scan()?;
        let mut skipped = HashSet::new();
        let mut last_failure = None;
        loop {
            self.state.enter(Phase::Selecting);
            let agent = self.ensure_present()?;
            let best = self
                .selector
                .select_best(agent, self.session.candidates(), &skipped);
            let Some(site) = best else { break };

            debug!(pos = %site.position, block = %site.block_type, priority = site.priority, "target selected");
            match self
                .extractor
                .extract(&site, &mut self.session, &self.stop)
                .await
            {
                Ok(outcome) => {
                    debug!(?outcome, "extraction finished");
                    self.guard.record_success(site.position);
                    return Ok(());
                }
                Err(e) if e.is_cancellation() || e.is_fatal() => return Err(e),
                // Only an unreachable site is held against the site itself.
                Err(e) if e.is_navigation() => {
                    warn!(pos = %site.position, error = %e, "target unreachable; trying the next one");
                    if self.guard.record_failure(site.position) {
                        warn!(pos = %site.position, "target keeps failing; abandoning it");
                        self.session.mark_explored(site.position);
                    }
                    skipped.insert(site.position);
                    last_failure = Some(e);
                    self.stop.checkpoint()?;
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(e) = last_failure {
            return Err(e);
        }
        self.state.enter(Phase::Expanding);
        self.expander.expand(&mut self.session, &self.stop).await?;
        self.stop.checkpoint()?;
        self.scan()
    }

    fn scan(&mut self) -> Result<(), QuarryError> {
        self.state.enter(Phase::Scanning);
        let center = self.ensure_present()?;
        self.session.merge_scan(
            &self.scanner,
            center,
            self.config.scan_horizontal_radius,
            self.config.scan_vertical_radius,
        );
        Ok(())
    }

    /// The agent's position, or a fatal error if it left the world.
    fn ensure_present(&self) -> Result<BlockPos, QuarryError> {
        let presence = &self.ports.presence;
        if !presence.is_alive() {
            return Err(QuarryError::Emergency("agent died".to_string()));
        }
        presence
            .position()
            .ok_or_else(|| QuarryError::Emergency("agent left the world".to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use quarry_types::Item;
    use quarry_world::{SimOp, SimWorld};

    fn fast_config() -> MiningConfig {
        MiningConfig {
            priorities: [("iron_ore".to_string(), 2)].into_iter().collect(),
            scan_horizontal_radius: 1,
            scan_vertical_radius: 1,
            loop_delay_ms: 5,
            error_backoff_ms: 5,
            navigation_timeout_secs: 1,
            ..MiningConfig::default()
        }
    }

    fn mining_loop(world: Arc<SimWorld>, config: MiningConfig, chests: ChestRegistry) -> MiningLoop {
        MiningLoop::new(
            config,
            AgentPorts::from_shared(world),
            EventBus::default(),
            StatsTracker::new(),
            chests,
        )
    }

    async fn wait_until(mut cond: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn index_of(ops: &[SimOp], pred: impl Fn(&SimOp) -> bool) -> Option<usize> {
        ops.iter().position(pred)
    }

    #[tokio::test]
    async fn start_without_presence_is_not_spawned() {
        let world = Arc::new(SimWorld::new().with_item(Item::new("iron_pickaxe", 1)));
        let ml = mining_loop(world, fast_config(), ChestRegistry::new());
        assert_eq!(ml.start().await, Err(QuarryError::NotSpawned));
        assert!(!ml.is_mining());
        assert_eq!(ml.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn start_without_pickaxe_is_no_tool() {
        let world = Arc::new(SimWorld::new().with_agent_at(BlockPos::default()));
        let ml = mining_loop(world, fast_config(), ChestRegistry::new());
        assert!(matches!(ml.start().await, Err(QuarryError::NoTool { .. })));
        assert!(!ml.is_mining());
    }

    #[tokio::test]
    async fn lone_iron_ore_is_mined() {
        let ore = BlockPos::new(1, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(ore, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ml = mining_loop(world.clone(), fast_config(), ChestRegistry::new());
        ml.start().await.unwrap();
        assert!(ml.is_mining());

        wait_until(|| ml.stats().total_extracted == 1).await;
        assert_eq!(world.block_name(ore), "air");
        assert_eq!(ml.stats().per_type["iron_ore"], 1);

        ml.stop();
        assert_eq!(ml.halted().await, LoopState::Idle);
        assert!(!ml.is_mining());
        let digs = world
            .ops()
            .iter()
            .filter(|op| matches!(op, SimOp::Dig(_)))
            .count();
        assert_eq!(digs, 1);
    }

    #[tokio::test]
    async fn second_start_is_a_no_op() {
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::default())
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ml = mining_loop(world, fast_config(), ChestRegistry::new());
        ml.start().await.unwrap();
        ml.start().await.unwrap();
        assert!(ml.is_mining());
        ml.stop();
        ml.halted().await;
    }

    #[tokio::test]
    async fn offload_runs_before_scan_at_the_threshold() {
        let chest = BlockPos::new(-2, 0, 0);
        let ore = BlockPos::new(1, 0, 0);
        // Two stacks in five slots: exactly the minimum of three free.
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_capacity(5)
                .with_chest(chest)
                .with_block(ore, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1))
                .with_item(Item::new("dirt", 64)),
        );
        let config = MiningConfig {
            scan_horizontal_radius: 4,
            ..fast_config()
        };
        let ml = mining_loop(world.clone(), config, ChestRegistry::with_chests([chest]));
        ml.start().await.unwrap();
        wait_until(|| world.ops().iter().any(|op| matches!(op, SimOp::Dig(_)))).await;
        ml.stop();
        ml.halted().await;

        let ops = world.ops();
        let deposit = index_of(&ops, |op| matches!(op, SimOp::Deposit { item, .. } if item == "dirt"))
            .expect("dirt was deposited");
        let close = index_of(&ops, |op| *op == SimOp::Close(chest)).unwrap();
        let dig = index_of(&ops, |op| *op == SimOp::Dig(ore)).unwrap();
        assert!(deposit < close && close < dig);
        assert_eq!(world.chest_contents(chest)[0].name, "dirt");
    }

    #[tokio::test]
    async fn nothing_new_starts_after_stop() {
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::default())
                .with_item(Item::new("iron_pickaxe", 1))
                .with_navigation_delay(Duration::from_millis(20)),
        );
        let ml = mining_loop(world.clone(), fast_config(), ChestRegistry::new());
        ml.start().await.unwrap();
        wait_until(|| world.ops().iter().any(|op| matches!(op, SimOp::Navigate(_)))).await;

        ml.stop();
        assert!(matches!(ml.state(), LoopState::Stopping | LoopState::Idle));
        ml.halted().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let ops = world.ops();
        let stopped_at = index_of(&ops, |op| *op == SimOp::StopNavigation).unwrap();
        assert!(
            !ops[stopped_at..].iter().any(|op| matches!(
                op,
                SimOp::Navigate(_) | SimOp::Dig(_) | SimOp::Deposit { .. } | SimOp::Open(_)
            )),
            "operation started after stop: {:?}",
            &ops[stopped_at..]
        );
    }

    #[tokio::test]
    async fn death_mid_navigation_is_an_emergency() {
        let ore = BlockPos::new(1, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(ore, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        world.hold_navigation();
        let bus = EventBus::default();
        let ml = MiningLoop::new(
            fast_config(),
            AgentPorts::from_shared(world.clone()),
            bus.clone(),
            StatsTracker::new(),
            ChestRegistry::new(),
        );
        let watcher = ml.watch_lifecycle(&bus);
        ml.start().await.unwrap();
        wait_until(|| world.ops().iter().any(|op| matches!(op, SimOp::Navigate(_)))).await;

        world.kill();
        bus.publish_lifecycle("test", LifecycleSignal::Death);
        wait_until(|| matches!(ml.state(), LoopState::EmergencyStopped { .. })).await;
        assert!(!ml.is_mining());

        // The pathfinder "arrives" after the emergency; nothing follows.
        world.release_navigation();
        tokio::time::sleep(Duration::from_millis(50)).await;
        let ops = world.ops();
        assert!(ops.contains(&SimOp::ClearMovement));
        assert!(!ops.iter().any(|op| matches!(op, SimOp::Dig(_))));
        assert_eq!(world.block_name(ore), "iron_ore");
        watcher.abort();
    }

    #[tokio::test]
    async fn low_health_respects_policy() {
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::default())
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ml = mining_loop(world, fast_config(), ChestRegistry::new());
        ml.start().await.unwrap();

        ml.on_lifecycle(&LifecycleSignal::LowHealth { health: 12.0 });
        assert!(ml.is_mining());

        ml.on_lifecycle(&LifecycleSignal::LowHealth { health: 4.0 });
        assert!(!ml.is_mining());
        assert!(matches!(ml.state(), LoopState::EmergencyStopped { reason } if reason.contains("low health")));
    }

    #[tokio::test]
    async fn emergency_is_restartable() {
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::default())
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ml = mining_loop(world, fast_config(), ChestRegistry::new());
        ml.start().await.unwrap();
        ml.emergency_stop("kicked: test");
        assert!(!ml.is_mining());

        ml.start().await.unwrap();
        assert!(ml.is_mining());
        ml.stop();
        assert_eq!(ml.halted().await, LoopState::Idle);
    }

    #[tokio::test]
    async fn losing_presence_mid_run_is_fatal() {
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::default())
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let ml = mining_loop(world.clone(), fast_config(), ChestRegistry::new());
        ml.start().await.unwrap();
        world.despawn();
        let state = ml.halted().await;
        assert!(matches!(state, LoopState::EmergencyStopped { .. }));
        assert!(!ml.is_mining());
    }

    #[tokio::test]
    async fn unreachable_target_is_abandoned() {
        let ore = BlockPos::new(1, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(ore, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1))
                .with_unreachable(ore),
        );
        let ml = mining_loop(world.clone(), fast_config(), ChestRegistry::new());
        ml.start().await.unwrap();

        // Once abandoned, the loop moves on to expanding the search.
        let expanding = |op: &SimOp| matches!(op, SimOp::Navigate(g) if g.position != ore);
        wait_until(|| world.ops().iter().any(expanding)).await;
        ml.stop();
        ml.halted().await;

        let attempts = world
            .ops()
            .iter()
            .filter(|op| matches!(op, SimOp::Navigate(g) if g.position == ore && g.tolerance == 2))
            .count();
        assert_eq!(attempts, 3);
        assert_eq!(ml.stats().total_extracted, 0);
    }

    #[tokio::test]
    async fn missing_tool_does_not_abandon_the_site() {
        let ore = BlockPos::new(1, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(ore, "iron_ore"),
        );
        let ml = mining_loop(world.clone(), fast_config(), ChestRegistry::new());
        let mut worker = Worker::new(&ml.inner, StopSignal::new());

        // More failed cycles than the stuck threshold.
        for _ in 0..4 {
            let err = worker.iteration().await.unwrap_err();
            assert!(matches!(err, QuarryError::NoTool { .. }), "{err}");
        }
        assert!(!worker.session.is_explored(ore));
        assert!(worker.session.candidates().contains(ore));
        assert_eq!(world.block_name(ore), "iron_ore");
    }

    #[tokio::test]
    async fn unreachable_best_site_falls_through_to_the_next() {
        let near = BlockPos::new(2, 0, 0);
        let far = BlockPos::new(-3, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_block(near, "iron_ore")
                .with_block(far, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1))
                .with_unreachable(near),
        );
        let config = MiningConfig {
            scan_horizontal_radius: 3,
            ..fast_config()
        };
        let ml = mining_loop(world.clone(), config, ChestRegistry::new());
        let mut worker = Worker::new(&ml.inner, StopSignal::new());

        worker.iteration().await.unwrap();

        assert_eq!(world.block_name(far), "air");
        assert_eq!(world.block_name(near), "iron_ore");
        assert!(!worker.session.is_explored(near));
        let ops = world.ops();
        let tried_near = index_of(&ops, |op| matches!(op, SimOp::Navigate(g) if g.position == near)).unwrap();
        let tried_far = index_of(&ops, |op| matches!(op, SimOp::Navigate(g) if g.position == far)).unwrap();
        assert!(tried_near < tried_far);
    }

    #[tokio::test]
    async fn offload_waits_for_the_dig_to_finish() {
        let chest = BlockPos::new(-2, 0, 0);
        let first = BlockPos::new(1, 0, 0);
        let second = BlockPos::new(0, 0, 2);
        // Pickaxe alone leaves four free slots; the first pickup hits the
        // minimum of three.
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_capacity(5)
                .with_chest(chest)
                .with_block(first, "iron_ore")
                .with_block(second, "iron_ore")
                .with_item(Item::new("iron_pickaxe", 1)),
        );
        let config = MiningConfig {
            scan_horizontal_radius: 4,
            ..fast_config()
        };
        let ml = mining_loop(world.clone(), config, ChestRegistry::with_chests([chest]));
        ml.start().await.unwrap();
        let collects = |ops: &[SimOp]| ops.iter().filter(|op| matches!(op, SimOp::Collect(_))).count();
        wait_until(|| collects(&world.ops()) == 2).await;
        ml.stop();
        ml.halted().await;

        let ops = world.ops();
        for (i, _) in ops.iter().enumerate().filter(|(_, op)| matches!(op, SimOp::Dig(_))) {
            let pickup = i + index_of(&ops[i..], |op| matches!(op, SimOp::Collect(_))).unwrap();
            assert!(
                !ops[i..pickup]
                    .iter()
                    .any(|op| matches!(op, SimOp::Open(_) | SimOp::Deposit { .. })),
                "offload interrupted a dig: {:?}",
                &ops[i..=pickup]
            );
        }
        let open = index_of(&ops, |op| *op == SimOp::Open(chest)).expect("offload ran");
        let digs: Vec<usize> = ops
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, SimOp::Dig(_)))
            .map(|(i, _)| i)
            .collect();
        assert!(digs[0] < open && open < digs[1]);
    }

    #[tokio::test]
    async fn emergency_mid_deposit_closes_the_chest() {
        let chest = BlockPos::new(-2, 0, 0);
        let world = Arc::new(
            SimWorld::new()
                .with_agent_at(BlockPos::new(0, 0, 0))
                .with_capacity(5)
                .with_chest(chest)
                .with_item(Item::new("iron_pickaxe", 1))
                .with_item(Item::new("dirt", 64))
                .with_deposit_delay(Duration::from_secs(30)),
        );
        let ml = mining_loop(world.clone(), fast_config(), ChestRegistry::with_chests([chest]));
        ml.start().await.unwrap();
        wait_until(|| world.ops().iter().any(|op| matches!(op, SimOp::Deposit { .. }))).await;
        assert!(world.is_container_open());

        ml.emergency_stop("kicked: test");
        wait_until(|| !world.is_container_open()).await;
        assert!(world.ops().contains(&SimOp::Close(chest)));
        assert!(world.chest_contents(chest).is_empty());
        assert!(matches!(ml.state(), LoopState::EmergencyStopped { .. }));
    }
}
