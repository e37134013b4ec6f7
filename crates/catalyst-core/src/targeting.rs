//! Perception and territory targeting.
//!
//! Both searches are stateless: they read peer snapshots or the grid and return a
//! decision, leaving every mutation to the caller.

use ordered_float::OrderedFloat;
use rand::{Rng, RngCore};

use crate::agent::PeerView;
use crate::config::TargetingConfig;
use crate::grid::TerritoryGrid;
use crate::{Faction, Position};

/// Nearest alive, non-eliminated peer of `faction` strictly within `range`.
///
/// Returns the peer and its distance; equal distances keep the earlier peer.
#[must_use]
pub fn nearest_peer(
    peers: &[PeerView],
    origin: Position,
    faction: Faction,
    range: f32,
) -> Option<(PeerView, f32)> {
    peers
        .iter()
        .filter(|peer| peer.faction == faction && peer.alive && !peer.eliminated)
        .map(|peer| (*peer, peer.position.distance_to(origin)))
        .filter(|(_, dist)| *dist < range)
        .min_by_key(|(_, dist)| OrderedFloat(*dist))
}

/// Inputs for one enemy-cell search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetQuery {
    pub faction: Faction,
    pub origin: Position,
    /// Faction being ganged up on, when the searcher is part of a gang-up.
    pub trailing: Option<Faction>,
    /// Whether each faction's catalyst is currently alive, by faction index.
    pub alive: [bool; Faction::COUNT],
}

/// Score a candidate cell, `None` for off-board or friendly cells.
#[must_use]
pub fn score_candidate(
    grid: &TerritoryGrid,
    query: &TargetQuery,
    config: &TargetingConfig,
    row: usize,
    col: usize,
) -> Option<f32> {
    let cell = grid.cell(row, col)?;
    if cell.owner == query.faction {
        return None;
    }

    let neighbors = grid.neighbors(row, col);
    let mut enemy_neighbors = 0u32;
    let mut touches_own = false;
    for n in &neighbors {
        match grid.owner(n.row, n.col) {
            Some(owner) if owner == query.faction => touches_own = true,
            Some(_) => enemy_neighbors += 1,
            None => {}
        }
    }

    let mut priority = 1.0;
    if !query.alive[cell.owner.index()] {
        priority *= config.dead_enemy_priority;
    }
    if query.trailing == Some(cell.owner) {
        priority *= config.gang_up_bias;
    }

    let max_strength = grid.config().max_strength;
    let weakness = config.weakness_weight * (1.0 - cell.strength / max_strength).clamp(0.0, 1.0);
    let border = if touches_own { config.border_bonus } else { 1.0 };
    let center = grid.hex_center(row, col);
    let proximity = (1.0 - center.distance_to(query.origin) / config.distance_normalizer).max(0.0);

    Some(enemy_neighbors as f32 * priority * (1.0 + weakness) * border * proximity)
}

/// Bounded random search for an enemy cell worth claiming.
///
/// Samples `search_attempts` uniform coordinates and returns the centre of the
/// best-scoring one; ties keep the first candidate found.
pub fn acquire_target(
    grid: &TerritoryGrid,
    query: &TargetQuery,
    config: &TargetingConfig,
    rng: &mut dyn RngCore,
) -> Option<Position> {
    let mut best: Option<(f32, usize, usize)> = None;
    for _ in 0..config.search_attempts {
        let row = rng.gen_range(0..grid.rows());
        let col = rng.gen_range(0..grid.cols());
        let Some(score) = score_candidate(grid, query, config, row, col) else {
            continue;
        };
        if best.map_or(true, |(best_score, _, _)| score > best_score) {
            best = Some((score, row, col));
        }
    }
    best.map(|(_, row, col)| grid.hex_center(row, col))
}
