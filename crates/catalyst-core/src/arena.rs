//! Match orchestration: owns the grid, the catalysts and the RNG, and runs the
//! fixed per-tick stage order.

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::agent::{Agent, AgentSnapshot, PeerView, StepContext};
use crate::combat::resolve_collisions;
use crate::config::ArenaConfig;
use crate::grid::{Cell, TerritoryGrid, TerritoryStats};
use crate::{ArenaError, ArenaEvent, Faction, Tick, TickEvents};

/// How many ticks a rendered frame is worth.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TickRate {
    /// One tick every other frame.
    Slow,
    #[default]
    Normal,
    /// `n` ticks per frame.
    Fast(u32),
}

/// Read-only view of the whole match for renderers and reports.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArenaSnapshot {
    pub tick: Tick,
    pub board_width: f32,
    pub board_height: f32,
    pub rows: usize,
    pub cols: usize,
    pub cells: Vec<Cell>,
    pub stats: TerritoryStats,
    pub agents: Vec<AgentSnapshot>,
    pub winner: Option<Faction>,
}

/// A running three-faction match.
#[derive(Debug)]
pub struct Arena {
    config: ArenaConfig,
    grid: TerritoryGrid,
    /// One catalyst per faction, in faction index order.
    agents: Vec<Agent>,
    rng: SmallRng,
    tick: Tick,
    frame: u64,
    paused: bool,
    stats: TerritoryStats,
    winner: Option<Faction>,
}

fn spawn_agents(config: &ArenaConfig) -> Vec<Agent> {
    Faction::ALL
        .into_iter()
        .zip(config.spawn_layout())
        .map(|(faction, (position, velocity))| Agent::new(faction, position, velocity, config))
        .collect()
}

impl Arena {
    /// Start a match on a board-sized grid.
    pub fn new(config: ArenaConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let grid =
            TerritoryGrid::for_board(config.board_width, config.board_height, &config.grid)?;
        Ok(Self::assemble(config, grid))
    }

    /// Start a match on a caller-supplied grid.
    pub fn with_grid(config: ArenaConfig, grid: TerritoryGrid) -> Result<Self, ArenaError> {
        config.validate()?;
        Ok(Self::assemble(config, grid))
    }

    fn assemble(config: ArenaConfig, grid: TerritoryGrid) -> Self {
        let rng = config.seeded_rng();
        let agents = spawn_agents(&config);
        let stats = grid.aggregate_stats();
        let mut arena = Self {
            config,
            grid,
            agents,
            rng,
            tick: Tick::zero(),
            frame: 0,
            paused: false,
            stats,
            winner: None,
        };
        arena.push_territory();
        arena
    }

    /// Rebuild the board and catalysts from the stored configuration.
    ///
    /// The RNG stream continues; everything else returns to its opening state.
    pub fn reset(&mut self) {
        self.grid.initialize();
        self.agents = spawn_agents(&self.config);
        self.tick = Tick::zero();
        self.frame = 0;
        self.winner = None;
        self.stats = self.grid.aggregate_stats();
        self.push_territory();
        debug!("arena reset");
    }

    /// Execute one tick and return the events it produced.
    pub fn step(&mut self) -> TickEvents {
        let next_tick = self.tick.next();
        let mut events = Vec::new();

        self.stage_grid(next_tick);
        self.stage_agents(next_tick, &mut events);
        self.stage_collisions(next_tick, &mut events);
        if next_tick.is_multiple_of(u64::from(self.config.stats_interval)) {
            self.stage_territory(next_tick, &mut events);
        }
        self.stage_winner(next_tick, &mut events);

        self.tick = next_tick;
        TickEvents {
            tick: next_tick,
            events,
        }
    }

    /// Advance one rendered frame at `rate`, returning the events of every tick run.
    ///
    /// A frame ends early on the tick that decides the match.
    pub fn advance_frame(&mut self, rate: TickRate) -> Vec<TickEvents> {
        if self.paused {
            return Vec::new();
        }
        self.frame += 1;
        let runs = match rate {
            TickRate::Slow => u32::from(self.frame % 2 == 0),
            TickRate::Normal => 1,
            TickRate::Fast(n) => n,
        };
        let undecided = self.winner.is_none();
        let mut ran = Vec::with_capacity(runs as usize);
        for _ in 0..runs {
            ran.push(self.step());
            if undecided && self.winner.is_some() {
                break;
            }
        }
        ran
    }

    fn stage_grid(&mut self, tick: Tick) {
        if tick.is_multiple_of(u64::from(self.config.grid.update_interval)) {
            self.grid.advance(tick);
        }
    }

    /// Catalysts update in faction order; each sees the others' state as left by
    /// any earlier update in the same tick.
    fn stage_agents(&mut self, tick: Tick, events: &mut Vec<ArenaEvent>) {
        for idx in 0..self.agents.len() {
            let peers: SmallVec<[PeerView; 3]> = self.agents.iter().map(Agent::view).collect();
            let mut ctx = StepContext {
                tick,
                config: &self.config,
                peers: &peers,
                grid: &mut self.grid,
                rng: &mut self.rng,
                events: &mut *events,
            };
            self.agents[idx].update(&mut ctx);
        }
    }

    fn stage_collisions(&mut self, tick: Tick, events: &mut Vec<ArenaEvent>) {
        if let Some(outcome) = resolve_collisions(&mut self.agents, &self.config, tick) {
            events.push(outcome.event());
        }
    }

    /// Recount the board, push shares into the catalysts and eliminate depleted factions.
    fn stage_territory(&mut self, tick: Tick, events: &mut Vec<ArenaEvent>) {
        self.stats = self.grid.aggregate_stats();
        self.push_territory();
        let threshold = self.config.power.elimination_threshold;
        for agent in &mut self.agents {
            if !agent.eliminated && agent.territory_share <= threshold {
                agent.eliminate();
                events.push(ArenaEvent::Eliminated {
                    faction: agent.faction,
                });
                info!(
                    faction = %agent.faction,
                    tick = tick.0,
                    share = agent.territory_share,
                    "faction eliminated"
                );
            }
        }
    }

    fn stage_winner(&mut self, tick: Tick, events: &mut Vec<ArenaEvent>) {
        if self.winner.is_some() {
            return;
        }
        let mut remaining = self.agents.iter().filter(|agent| !agent.eliminated);
        if let (Some(last), None) = (remaining.next(), remaining.next()) {
            let winner = last.faction;
            self.winner = Some(winner);
            events.push(ArenaEvent::MatchDecided { winner });
            info!(winner = %winner, tick = tick.0, "match decided");
        }
    }

    fn push_territory(&mut self) {
        for agent in &mut self.agents {
            agent.set_territory_share(self.stats.share(agent.faction));
        }
    }

    /// Pause or resume frame advancement; `step` is unaffected.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Frames advanced since the match started (paused frames excluded).
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub fn grid(&self) -> &TerritoryGrid {
        &self.grid
    }

    #[must_use]
    pub fn grid_mut(&mut self) -> &mut TerritoryGrid {
        &mut self.grid
    }

    /// Catalysts in faction index order.
    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[must_use]
    pub fn agent(&self, faction: Faction) -> &Agent {
        &self.agents[faction.index()]
    }

    #[must_use]
    pub fn agent_mut(&mut self, faction: Faction) -> &mut Agent {
        &mut self.agents[faction.index()]
    }

    /// Territory counts from the most recent stats refresh.
    #[must_use]
    pub const fn stats(&self) -> &TerritoryStats {
        &self.stats
    }

    /// The last faction standing, once decided.
    #[must_use]
    pub const fn winner(&self) -> Option<Faction> {
        self.winner
    }

    /// Borrow the arena RNG mutably for deterministic sampling.
    #[must_use]
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    #[must_use]
    pub fn snapshot(&self) -> ArenaSnapshot {
        ArenaSnapshot {
            tick: self.tick,
            board_width: self.config.board_width,
            board_height: self.config.board_height,
            rows: self.grid.rows(),
            cols: self.grid.cols(),
            cells: self.grid.cells().to_vec(),
            stats: self.stats,
            agents: self.agents.iter().map(Agent::snapshot).collect(),
            winner: self.winner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> ArenaConfig {
        ArenaConfig {
            rng_seed: Some(seed),
            ..ArenaConfig::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = seeded(1);
        config.grid.update_interval = 0;
        assert!(matches!(
            Arena::new(config),
            Err(ArenaError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unbounded_boards_fail_construction() {
        let mut config = seeded(1);
        config.board_width = f32::INFINITY;
        assert!(matches!(
            Arena::new(config),
            Err(ArenaError::InvalidConfig(_))
        ));

        let mut config = seeded(1);
        config.board_width = 1.0e9;
        config.board_height = 1.0e9;
        assert!(matches!(
            Arena::new(config),
            Err(ArenaError::GridTooLarge { .. })
        ));
    }

    #[test]
    fn construction_spawns_and_pushes_initial_shares() {
        let arena = Arena::new(seeded(1)).expect("arena");
        assert_eq!(arena.tick(), Tick::zero());
        assert_eq!(arena.agents().len(), Faction::COUNT);
        let stats = arena.stats();
        assert_eq!(stats.total, arena.grid().len());
        for (agent, faction) in arena.agents().iter().zip(Faction::ALL) {
            assert_eq!(agent.faction, faction);
            assert!(agent.alive);
            assert_eq!(agent.position, agent.spawn_point);
            assert!((agent.territory_share - stats.share(faction)).abs() < 1e-6);
            assert!(agent.territory_share > 0.2);
        }
    }

    #[test]
    fn same_seed_same_match() {
        let mut a = Arena::new(seeded(99)).expect("arena");
        let mut b = Arena::new(seeded(99)).expect("arena");
        for _ in 0..400 {
            assert_eq!(a.step(), b.step());
        }
        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn step_advances_tick_and_labels_events() {
        let mut arena = Arena::new(seeded(3)).expect("arena");
        let events = arena.step();
        assert_eq!(events.tick, Tick(1));
        assert_eq!(arena.tick(), Tick(1));
        for _ in 0..9 {
            arena.step();
        }
        assert_eq!(arena.tick(), Tick(10));
    }

    #[test]
    fn frame_rates_control_ticks_per_frame() {
        let mut arena = Arena::new(seeded(4)).expect("arena");
        let slow: usize = (0..4)
            .map(|_| arena.advance_frame(TickRate::Slow).len())
            .sum();
        assert_eq!(slow, 2);
        assert_eq!(arena.tick(), Tick(2));

        assert_eq!(arena.advance_frame(TickRate::Normal).len(), 1);
        assert_eq!(arena.advance_frame(TickRate::Fast(3)).len(), 3);
        assert_eq!(arena.tick(), Tick(6));

        arena.set_paused(true);
        assert!(arena.advance_frame(TickRate::Fast(5)).is_empty());
        assert_eq!(arena.tick(), Tick(6));
        assert_eq!(arena.frame(), 6);
        arena.set_paused(false);
        assert_eq!(arena.advance_frame(TickRate::Normal).len(), 1);
    }

    #[test]
    fn depleted_factions_are_eliminated_and_the_match_decided_once() {
        let mut config = seeded(8);
        config.stats_interval = 1;
        let mut arena = Arena::new(config).expect("arena");
        arena.grid_mut().fill(Faction::Orange);

        let first = arena.step();
        assert!(first.events.contains(&ArenaEvent::Eliminated {
            faction: Faction::Gray
        }));
        assert!(first.events.contains(&ArenaEvent::Eliminated {
            faction: Faction::Cyan
        }));
        assert_eq!(
            first.events.last(),
            Some(&ArenaEvent::MatchDecided {
                winner: Faction::Orange
            })
        );
        assert_eq!(arena.winner(), Some(Faction::Orange));
        assert!(arena.agent(Faction::Gray).eliminated);
        assert!(!arena.agent(Faction::Gray).alive);

        for _ in 0..50 {
            let events = arena.step();
            assert!(!events.events.iter().any(|e| matches!(
                e,
                ArenaEvent::MatchDecided { .. } | ArenaEvent::Eliminated { .. }
            )));
        }
    }

    #[test]
    fn fast_frame_stops_on_the_deciding_tick() {
        let mut config = seeded(8);
        config.stats_interval = 1;
        let mut arena = Arena::new(config).expect("arena");
        arena.grid_mut().fill(Faction::Orange);

        let frame = arena.advance_frame(TickRate::Fast(5));
        assert_eq!(frame.len(), 1);
        assert_eq!(arena.tick(), Tick(1));
        assert_eq!(arena.winner(), Some(Faction::Orange));

        // Once decided, frames run at the full rate again.
        assert_eq!(arena.advance_frame(TickRate::Fast(5)).len(), 5);
        assert_eq!(arena.tick(), Tick(6));
    }

    #[test]
    fn eliminated_catalysts_stay_put() {
        let mut config = seeded(8);
        config.stats_interval = 1;
        let mut arena = Arena::new(config).expect("arena");
        arena.grid_mut().fill(Faction::Orange);
        arena.step();
        let frozen = arena.agent(Faction::Cyan).clone();
        for _ in 0..100 {
            arena.step();
        }
        let cyan = arena.agent(Faction::Cyan);
        assert!(cyan.eliminated && !cyan.alive);
        assert_eq!(cyan.position, frozen.position);
        assert_eq!(cyan.velocity, frozen.velocity);
        assert_eq!(cyan.respawn_timer, 0);
    }

    #[test]
    fn reset_restores_opening_state() {
        let mut arena = Arena::new(seeded(12)).expect("arena");
        let opening = arena.snapshot();
        for _ in 0..200 {
            arena.step();
        }
        arena.advance_frame(TickRate::Normal);
        arena.reset();
        assert_eq!(arena.tick(), Tick::zero());
        assert_eq!(arena.frame(), 0);
        assert_eq!(arena.winner(), None);
        let after = arena.snapshot();
        assert_eq!(after.cells, opening.cells);
        assert_eq!(after.agents, opening.agents);
    }

    #[test]
    fn snapshot_serializes() {
        let mut arena = Arena::new(seeded(5)).expect("arena");
        arena.step();
        let snapshot = arena.snapshot();
        assert_eq!(snapshot.cells.len(), snapshot.rows * snapshot.cols);
        let json = serde_json::to_string(&snapshot).expect("serialize");
        let back: ArenaSnapshot = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.tick, snapshot.tick);
        assert_eq!(back.agents.len(), Faction::COUNT);
    }
}
