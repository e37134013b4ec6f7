//! Pairwise collision detection, lethal adjudication and bounce response.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::agent::Agent;
use crate::config::ArenaConfig;
use crate::{direction, ArenaEvent, BehaviorMode, Faction, Tick};

/// Result of the single collision resolved in a tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollisionOutcome {
    Lethal {
        killer: Faction,
        victim: Faction,
        kill_streak: u32,
    },
    NonLethal {
        first: Faction,
        second: Faction,
    },
}

impl CollisionOutcome {
    /// Event surfaced to announcement consumers.
    #[must_use]
    pub const fn event(self) -> ArenaEvent {
        match self {
            CollisionOutcome::Lethal {
                killer,
                victim,
                kill_streak,
            } => ArenaEvent::LethalCollision {
                killer,
                victim,
                kill_streak,
            },
            CollisionOutcome::NonLethal { first, second } => {
                ArenaEvent::NonLethalCollision { first, second }
            }
        }
    }
}

/// Which side of a touching pair wins, if the contact is lethal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    FirstKills,
    SecondKills,
    Bounce,
}

fn adjudicate(first: &Agent, second: &Agent) -> Verdict {
    if first.last_stand_active() {
        Verdict::FirstKills
    } else if second.last_stand_active() {
        Verdict::SecondKills
    } else if first.mode == BehaviorMode::Chase && second.faction == first.faction.prey() {
        Verdict::FirstKills
    } else if second.mode == BehaviorMode::Chase && first.faction == second.faction.prey() {
        Verdict::SecondKills
    } else {
        Verdict::Bounce
    }
}

/// Resolve at most one touching pair, scanning `(i, j)` with `i < j` in order.
///
/// Dead and eliminated agents are ignored. Later touching pairs are left for the
/// next tick.
pub fn resolve_collisions(
    agents: &mut [Agent],
    config: &ArenaConfig,
    tick: Tick,
) -> Option<CollisionOutcome> {
    let padding = config.combat.padding;
    for i in 0..agents.len() {
        for j in (i + 1)..agents.len() {
            if !agents[i].is_active() || !agents[j].is_active() {
                continue;
            }
            let reach = agents[i].radius + agents[j].radius + padding;
            let dist = agents[i].position.distance_to(agents[j].position);
            if dist >= reach {
                continue;
            }
            let (head, tail) = agents.split_at_mut(j);
            return Some(resolve_pair(&mut head[i], &mut tail[0], dist, reach, config, tick));
        }
    }
    None
}

fn resolve_pair(
    first: &mut Agent,
    second: &mut Agent,
    dist: f32,
    reach: f32,
    config: &ArenaConfig,
    tick: Tick,
) -> CollisionOutcome {
    let (killer, victim) = match adjudicate(first, second) {
        Verdict::FirstKills => (first, second),
        Verdict::SecondKills => (second, first),
        Verdict::Bounce => {
            bounce(first, second, dist, reach, config.combat.bounce_factor);
            debug!(
                first = %first.faction,
                second = %second.faction,
                tick = tick.0,
                "catalysts bounced"
            );
            return CollisionOutcome::NonLethal {
                first: first.faction,
                second: second.faction,
            };
        }
    };

    victim.die(&config.power);
    let kill_streak = killer.register_kill(tick, config.power.kill_streak_window);
    debug!(
        killer = %killer.faction,
        victim = %victim.faction,
        kill_streak,
        respawn_in = victim.respawn_timer,
        tick = tick.0,
        "lethal collision"
    );
    CollisionOutcome::Lethal {
        killer: killer.faction,
        victim: victim.faction,
        kill_streak,
    }
}

/// Swap and amplify the velocity components along the contact normal, then push
/// the pair apart by half the overlap each.
fn bounce(first: &mut Agent, second: &mut Agent, dist: f32, reach: f32, factor: f32) {
    let Some((nx, ny, _)) = direction(first.position, second.position) else {
        return;
    };
    let v1 = first.velocity.vx * nx + first.velocity.vy * ny;
    let v2 = second.velocity.vx * nx + second.velocity.vy * ny;
    let u1 = v2 * factor;
    let u2 = v1 * factor;
    first.velocity.vx += (u1 - v1) * nx;
    first.velocity.vy += (u1 - v1) * ny;
    second.velocity.vx += (u2 - v2) * nx;
    second.velocity.vy += (u2 - v2) * ny;

    let half = (reach - dist) / 2.0;
    first.position.x -= nx * half;
    first.position.y -= ny * half;
    second.position.x += nx * half;
    second.position.y += ny * half;
}
