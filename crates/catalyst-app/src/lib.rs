//! Headless match runner: loads an arena configuration, plays a match at a
//! chosen frame rate and summarises the result.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use catalyst_core::{Arena, ArenaConfig, ArenaEvent, Faction, Tick, TickRate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Options accepted by [`run_headless`].
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessOptions {
    /// Stop once exactly this many ticks have run, or on the tick that decides
    /// the match. The final fast frame is shortened to fit.
    pub ticks: u64,
    /// Overrides the seed from the configuration file.
    pub seed: Option<u64>,
    /// JSON configuration; defaults are used when absent.
    pub config_path: Option<PathBuf>,
    pub rate: TickRate,
    /// Log a territory report every this many ticks (0 disables).
    pub report_every: u64,
}

impl Default for HeadlessOptions {
    fn default() -> Self {
        Self {
            ticks: 3_600,
            seed: None,
            config_path: None,
            rate: TickRate::Normal,
            report_every: 300,
        }
    }
}

/// Per-faction line of a [`MatchReport`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FactionReport {
    pub faction: Faction,
    pub percentage: u32,
    pub cells: usize,
    pub kills: u32,
    pub deaths: u32,
    pub last_stands: u32,
    pub alive: bool,
    pub eliminated_at: Option<Tick>,
}

/// Outcome of a headless match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchReport {
    pub seed: Option<u64>,
    pub ticks: u64,
    pub frames: u64,
    pub lethal_collisions: u32,
    pub bounces: u32,
    pub factions: Vec<FactionReport>,
    pub winner: Option<Faction>,
    pub decided_at: Option<Tick>,
}

impl MatchReport {
    fn new(seed: Option<u64>) -> Self {
        Self {
            seed,
            ticks: 0,
            frames: 0,
            lethal_collisions: 0,
            bounces: 0,
            factions: Faction::ALL
                .into_iter()
                .map(|faction| FactionReport {
                    faction,
                    percentage: 0,
                    cells: 0,
                    kills: 0,
                    deaths: 0,
                    last_stands: 0,
                    alive: true,
                    eliminated_at: None,
                })
                .collect(),
            winner: None,
            decided_at: None,
        }
    }

    fn faction_mut(&mut self, faction: Faction) -> &mut FactionReport {
        &mut self.factions[faction.index()]
    }

    fn record(&mut self, tick: Tick, event: ArenaEvent) {
        match event {
            ArenaEvent::LethalCollision { killer, victim, .. } => {
                self.lethal_collisions += 1;
                self.faction_mut(killer).kills += 1;
                self.faction_mut(victim).deaths += 1;
            }
            ArenaEvent::NonLethalCollision { .. } => self.bounces += 1,
            ArenaEvent::LastStandEntered { faction } => self.faction_mut(faction).last_stands += 1,
            ArenaEvent::Eliminated { faction } => {
                self.faction_mut(faction).eliminated_at = Some(tick);
            }
            ArenaEvent::MatchDecided { winner } => {
                self.winner = Some(winner);
                self.decided_at = Some(tick);
            }
        }
    }

    fn finish(&mut self, arena: &Arena) {
        self.ticks = arena.tick().0;
        self.frames = arena.frame();
        let stats = arena.grid().aggregate_stats();
        for agent in arena.agents() {
            let line = self.faction_mut(agent.faction);
            line.percentage = stats.percentages[agent.faction.index()];
            line.cells = stats.counts[agent.faction.index()];
            line.kills = agent.kills;
            line.alive = agent.alive;
        }
    }
}

/// Read an [`ArenaConfig`] from a JSON file; missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<ArenaConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: ArenaConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Play one match headlessly and report the result.
pub fn run_headless(options: &HeadlessOptions) -> Result<MatchReport> {
    if options.rate == TickRate::Fast(0) {
        bail!("fast rate must run at least one tick per frame");
    }
    let mut config = match &options.config_path {
        Some(path) => load_config(path)?,
        None => ArenaConfig::default(),
    };
    if options.seed.is_some() {
        config.rng_seed = options.seed;
    }
    let seed = config.rng_seed;
    let mut arena = Arena::new(config).context("invalid arena configuration")?;
    info!(
        rows = arena.grid().rows(),
        cols = arena.grid().cols(),
        ticks = options.ticks,
        rate = ?options.rate,
        "starting headless match"
    );

    let mut report = MatchReport::new(seed);
    while arena.tick().0 < options.ticks && arena.winner().is_none() {
        let remaining = options.ticks - arena.tick().0;
        let rate = match options.rate {
            TickRate::Fast(n) if u64::from(n) > remaining => {
                TickRate::Fast(u32::try_from(remaining).unwrap_or(n))
            }
            rate => rate,
        };
        for tick_events in arena.advance_frame(rate) {
            for event in &tick_events.events {
                debug!(tick = tick_events.tick.0, ?event, "arena event");
                report.record(tick_events.tick, *event);
            }
            if options.report_every > 0 && tick_events.tick.is_multiple_of(options.report_every) {
                log_territory(&arena, tick_events.tick);
            }
        }
    }

    report.finish(&arena);
    info!(
        ticks = report.ticks,
        winner = ?report.winner,
        lethal = report.lethal_collisions,
        "match finished"
    );
    Ok(report)
}

fn log_territory(arena: &Arena, tick: Tick) {
    let pct = arena.stats().percentages;
    let leaders: Vec<&str> = arena.stats().leaders().iter().map(|f| f.name()).collect();
    info!(
        tick = tick.0,
        orange = pct[Faction::Orange.index()],
        gray = pct[Faction::Gray.index()],
        cyan = pct[Faction::Cyan.index()],
        leaders = ?leaders,
        "territory report"
    );
}

/// Human-readable summary used by the binary when JSON output is not requested.
#[must_use]
pub fn render_summary(report: &MatchReport) -> String {
    let mut out = format!(
        "ticks {} ({} frames), {} kills, {} bounces\n",
        report.ticks, report.frames, report.lethal_collisions, report.bounces
    );
    for line in &report.factions {
        let status = match (line.alive, line.eliminated_at) {
            (_, Some(tick)) => format!("eliminated at tick {}", tick.0),
            (true, None) => "alive".to_owned(),
            (false, None) => "respawning".to_owned(),
        };
        out.push_str(&format!(
            "{:<7} {:>3}% ({} cells)  kills {:<3} deaths {:<3} last stands {:<2} {}\n",
            line.faction.name(),
            line.percentage,
            line.cells,
            line.kills,
            line.deaths,
            line.last_stands,
            status
        ));
    }
    match (report.winner, report.decided_at) {
        (Some(winner), Some(tick)) => {
            out.push_str(&format!("winner: {winner} at tick {}\n", tick.0));
        }
        _ => out.push_str("no winner yet\n"),
    }
    out
}
