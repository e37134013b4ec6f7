//! Catalyst behaviour: perception, mode selection, steering, territory claims
//! and the kill/respawn/last-stand meta state.

use ordered_float::OrderedFloat;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, info};

use crate::config::{ArenaConfig, PowerConfig};
use crate::grid::TerritoryGrid;
use crate::targeting::{acquire_target, nearest_peer, TargetQuery};
use crate::{direction, ArenaEvent, Faction, Position, Tick, Velocity};

/// Behaviour state selected every tick.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorMode {
    /// Roaming toward enemy territory.
    #[default]
    Hunt,
    /// Pursuing the nearest prey catalyst.
    Chase,
    /// Running from the nearest predator.
    Flee,
    /// Pressing the trailing faction together with the other survivor.
    GangUp,
}

/// Public fields other catalysts may read during their own update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PeerView {
    pub faction: Faction,
    pub position: Position,
    pub alive: bool,
    pub eliminated: bool,
    pub territory_share: f32,
}

/// Read-only view for renderers and UI.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AgentSnapshot {
    pub faction: Faction,
    pub position: Position,
    pub velocity: Velocity,
    pub radius: f32,
    pub mode: BehaviorMode,
    pub target: Option<Position>,
    pub alive: bool,
    pub eliminated: bool,
    pub respawn_timer: u32,
    pub territory_share: f32,
    pub kills: u32,
    pub kill_streak: u32,
    pub kill_streak_active: bool,
    pub last_stand_mode: bool,
    pub last_stand_active: bool,
    pub last_stand_timer: u32,
    pub speed_multiplier: f32,
    pub impact_multiplier: f32,
}

/// Everything a catalyst touches during one update.
pub struct StepContext<'a> {
    pub tick: Tick,
    pub config: &'a ArenaConfig,
    /// Views of every catalyst (including this one) taken just before this update.
    pub peers: &'a [PeerView],
    pub grid: &'a mut TerritoryGrid,
    pub rng: &'a mut dyn RngCore,
    pub events: &'a mut Vec<ArenaEvent>,
}

/// One faction's catalyst.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub faction: Faction,
    pub position: Position,
    pub velocity: Velocity,
    pub radius: f32,
    pub target: Option<Position>,
    pub mode: BehaviorMode,
    pub alive: bool,
    pub eliminated: bool,
    pub respawn_timer: u32,
    pub spawn_point: Position,
    /// Pushed in by the arena; never derived by the agent itself.
    pub territory_share: f32,
    pub speed_multiplier: f32,
    pub impact_multiplier: f32,
    pub kills: u32,
    pub kill_streak: u32,
    pub last_kill_tick: Tick,
    pub kill_streak_active: bool,
    /// One-shot latch for the current life.
    pub last_stand_mode: bool,
    pub last_stand_timer: u32,
}

/// Respawn delay for a catalyst that died holding `share` of the board.
///
/// Every full 10%-of-weak-threshold step below the weak threshold adds the
/// per-step penalty; the result never exceeds the configured maximum.
#[must_use]
pub fn respawn_delay(share: f32, power: &PowerConfig) -> u32 {
    let mut delay = power.respawn_base_delay;
    if power.weak_threshold > 0.0 && share < power.weak_threshold {
        let deficit = (power.weak_threshold - share.max(0.0)) / power.weak_threshold;
        let steps = (deficit * 10.0).floor() as u32;
        delay = delay.saturating_add(steps.saturating_mul(power.respawn_penalty_per_step));
    }
    delay.min(power.respawn_max_delay)
}

impl Agent {
    /// Create a live catalyst at its spawn point.
    #[must_use]
    pub fn new(
        faction: Faction,
        spawn_point: Position,
        velocity: Velocity,
        config: &ArenaConfig,
    ) -> Self {
        Self {
            faction,
            position: spawn_point,
            velocity,
            radius: config.catalyst.radius,
            target: None,
            mode: BehaviorMode::Hunt,
            alive: true,
            eliminated: false,
            respawn_timer: 0,
            spawn_point,
            territory_share: 1.0 / Faction::COUNT as f32,
            speed_multiplier: 1.0,
            impact_multiplier: 1.0,
            kills: 0,
            kill_streak: 0,
            last_kill_tick: Tick::zero(),
            kill_streak_active: false,
            last_stand_mode: false,
            last_stand_timer: 0,
        }
    }

    /// Alive and still in the match.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.alive && !self.eliminated
    }

    /// Whether the last-stand buff is currently running.
    #[must_use]
    pub const fn last_stand_active(&self) -> bool {
        self.last_stand_mode && self.last_stand_timer > 0
    }

    #[must_use]
    pub fn view(&self) -> PeerView {
        PeerView {
            faction: self.faction,
            position: self.position,
            alive: self.alive,
            eliminated: self.eliminated,
            territory_share: self.territory_share,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            faction: self.faction,
            position: self.position,
            velocity: self.velocity,
            radius: self.radius,
            mode: self.mode,
            target: self.target,
            alive: self.alive,
            eliminated: self.eliminated,
            respawn_timer: self.respawn_timer,
            territory_share: self.territory_share,
            kills: self.kills,
            kill_streak: self.kill_streak,
            kill_streak_active: self.kill_streak_active,
            last_stand_mode: self.last_stand_mode,
            last_stand_active: self.last_stand_active(),
            last_stand_timer: self.last_stand_timer,
            speed_multiplier: self.speed_multiplier,
            impact_multiplier: self.impact_multiplier,
        }
    }

    /// Territory channel used by the arena's periodic stats push.
    pub fn set_territory_share(&mut self, share: f32) {
        self.territory_share = share.clamp(0.0, 1.0);
    }

    /// Advance this catalyst by one tick.
    pub fn update(&mut self, ctx: &mut StepContext<'_>) {
        let config: &ArenaConfig = ctx.config;
        if self.eliminated {
            return;
        }
        if !self.alive {
            self.respawn_timer = self.respawn_timer.saturating_sub(1);
            if self.respawn_timer == 0 {
                self.respawn(&mut *ctx.rng, config.catalyst.respawn_velocity_jitter);
                debug!(faction = %self.faction, tick = ctx.tick.0, "catalyst respawned");
            }
            return;
        }

        if !self.refresh_power(ctx.tick, &config.power, ctx.events) {
            return;
        }

        let cat = &config.catalyst;
        let trailing = self.gang_up_target(ctx.peers, config.power.gang_up_threshold);
        let predator = nearest_peer(
            ctx.peers,
            self.position,
            self.faction.predator(),
            cat.predator_detection_range,
        );
        let prey = nearest_peer(
            ctx.peers,
            self.position,
            self.faction.prey(),
            cat.prey_detection_range,
        );

        self.mode = match (predator, trailing, prey) {
            (Some(_), None, _) => BehaviorMode::Flee,
            (_, Some(_), _) => BehaviorMode::GangUp,
            (_, _, Some(_)) => BehaviorMode::Chase,
            _ => BehaviorMode::Hunt,
        };

        let (fx, fy) = match self.mode {
            BehaviorMode::Flee => predator
                .and_then(|(threat, _)| direction(threat.position, self.position))
                .map_or((0.0, 0.0), |(nx, ny, dist)| {
                    let force =
                        cat.flee_strength * (1.0 - dist / cat.predator_detection_range).max(0.0);
                    (nx * force, ny * force)
                }),
            BehaviorMode::Chase => prey
                .and_then(|(quarry, _)| direction(self.position, quarry.position))
                .map_or((0.0, 0.0), |(nx, ny, _)| {
                    (nx * cat.chase_strength, ny * cat.chase_strength)
                }),
            BehaviorMode::Hunt | BehaviorMode::GangUp => self.seek_territory(ctx, trailing),
        };

        self.integrate(fx, fy, config);

        let claim_radius =
            ctx.grid.config().hex_radius * cat.impact_radius * self.impact_multiplier;
        ctx.grid
            .claim_radius(self.position, claim_radius, self.faction, ctx.tick);
    }

    /// Expire streaks, run the last-stand latch/timer and rebuild multipliers.
    ///
    /// Returns `false` when the last stand ran out and the catalyst was eliminated.
    fn refresh_power(
        &mut self,
        tick: Tick,
        power: &PowerConfig,
        events: &mut Vec<ArenaEvent>,
    ) -> bool {
        if self.kill_streak > 0
            && tick.since(self.last_kill_tick) > u64::from(power.kill_streak_window)
        {
            self.kill_streak = 0;
            self.kill_streak_active = false;
        }

        if !self.last_stand_mode {
            if self.territory_share < power.last_stand_threshold {
                self.last_stand_mode = true;
                self.last_stand_timer = power.last_stand_duration;
                events.push(ArenaEvent::LastStandEntered {
                    faction: self.faction,
                });
                info!(
                    faction = %self.faction,
                    tick = tick.0,
                    share = self.territory_share,
                    "catalyst entered last stand"
                );
            }
        } else if self.last_stand_timer > 0 {
            self.last_stand_timer -= 1;
            if self.last_stand_timer == 0 && self.territory_share < power.last_stand_threshold {
                self.eliminate();
                events.push(ArenaEvent::Eliminated {
                    faction: self.faction,
                });
                info!(
                    faction = %self.faction,
                    tick = tick.0,
                    "last stand expired; faction eliminated"
                );
                return false;
            }
        }

        let (mut speed, mut impact) = if self.last_stand_active() {
            (power.last_stand_speed_bonus, power.last_stand_impact_bonus)
        } else if self.territory_share >= power.dominant_threshold {
            (power.dominant_speed_bonus, power.dominant_impact_bonus)
        } else if self.territory_share < power.weak_threshold {
            (power.weak_speed_penalty, 1.0)
        } else {
            (1.0, 1.0)
        };
        if self.kill_streak >= 2 {
            speed *= power.streak_speed_bonus;
        }
        if self.kill_streak >= 3 {
            impact *= power.streak_impact_bonus;
        }
        self.speed_multiplier = speed;
        self.impact_multiplier = impact;
        true
    }

    /// Faction to gang up on, if this catalyst qualifies this tick.
    fn gang_up_target(&self, peers: &[PeerView], threshold: f32) -> Option<Faction> {
        let alive: SmallVec<[&PeerView; 3]> = peers
            .iter()
            .filter(|peer| peer.alive && !peer.eliminated)
            .collect();
        if alive.len() != Faction::COUNT {
            return None;
        }
        let trailing = alive
            .iter()
            .min_by_key(|peer| OrderedFloat(peer.territory_share))?;
        let leader_share = alive
            .iter()
            .map(|peer| peer.territory_share)
            .fold(f32::MIN, f32::max);
        if trailing.faction != self.faction && leader_share - trailing.territory_share > threshold
        {
            Some(trailing.faction)
        } else {
            None
        }
    }

    fn seek_territory(
        &mut self,
        ctx: &mut StepContext<'_>,
        trailing: Option<Faction>,
    ) -> (f32, f32) {
        let config: &ArenaConfig = ctx.config;
        let search = self.mode == BehaviorMode::GangUp
            || ctx.rng.gen::<f32>() < config.targeting.reacquire_chance;
        if search {
            let mut alive = [false; Faction::COUNT];
            for peer in ctx.peers {
                alive[peer.faction.index()] = peer.alive && !peer.eliminated;
            }
            let query = TargetQuery {
                faction: self.faction,
                origin: self.position,
                trailing,
                alive,
            };
            if let Some(target) =
                acquire_target(&*ctx.grid, &query, &config.targeting, &mut *ctx.rng)
            {
                self.target = Some(target);
            }
        }

        let Some(target) = self.target else {
            return (0.0, 0.0);
        };
        match direction(self.position, target) {
            Some((nx, ny, dist)) if dist > config.catalyst.target_arrival_distance => {
                let strength = config.catalyst.territory_seek_strength;
                (nx * strength, ny * strength)
            }
            _ => {
                self.target = None;
                (0.0, 0.0)
            }
        }
    }

    /// Apply force, clamp speed, move and bounce off the walls.
    fn integrate(&mut self, fx: f32, fy: f32, config: &ArenaConfig) {
        let cat = &config.catalyst;
        self.velocity.vx += fx;
        self.velocity.vy += fy;

        let mut cap = cat.max_speed * self.speed_multiplier;
        if self.mode == BehaviorMode::Chase {
            cap *= cat.hunter_speed_boost;
        }
        let speed = self.velocity.speed();
        if speed > cap && speed > 0.0 {
            let scale = cap / speed;
            self.velocity.vx *= scale;
            self.velocity.vy *= scale;
        }

        self.position.x += self.velocity.vx;
        self.position.y += self.velocity.vy;

        let r = self.radius;
        let (width, height) = (config.board_width, config.board_height);
        if self.position.x < r || self.position.x > width - r {
            self.velocity.vx *= -cat.wall_restitution;
            self.position.x = self.position.x.max(r).min(width - r);
        }
        if self.position.y < r || self.position.y > height - r {
            self.velocity.vy *= -cat.wall_restitution;
            self.position.y = self.position.y.max(r).min(height - r);
        }
    }

    /// Record a kill at `tick`, returning the resulting streak.
    pub fn register_kill(&mut self, tick: Tick, window: u32) -> u32 {
        let continues =
            self.kill_streak > 0 && tick.since(self.last_kill_tick) <= u64::from(window);
        self.kill_streak = if continues { self.kill_streak + 1 } else { 1 };
        self.kills += 1;
        self.last_kill_tick = tick;
        self.kill_streak_active = self.kill_streak >= 2;
        self.kill_streak
    }

    /// Ordinary death: start the respawn countdown and drop per-life state.
    pub fn die(&mut self, power: &PowerConfig) {
        self.alive = false;
        self.respawn_timer = respawn_delay(self.territory_share, power);
        self.clear_life_state();
    }

    /// Permanent removal from the match.
    pub fn eliminate(&mut self) {
        self.eliminated = true;
        self.alive = false;
        self.respawn_timer = 0;
        self.clear_life_state();
    }

    fn clear_life_state(&mut self) {
        self.velocity = Velocity::default();
        self.target = None;
        self.mode = BehaviorMode::Hunt;
        self.kill_streak = 0;
        self.kill_streak_active = false;
        self.last_stand_mode = false;
        self.last_stand_timer = 0;
        self.speed_multiplier = 1.0;
        self.impact_multiplier = 1.0;
    }

    fn respawn(&mut self, rng: &mut dyn RngCore, jitter: f32) {
        self.position = self.spawn_point;
        self.velocity = Velocity::new(
            rng.gen_range(-jitter..=jitter),
            rng.gen_range(-jitter..=jitter),
        );
        self.target = None;
        self.mode = BehaviorMode::Hunt;
        self.alive = true;
    }
}
