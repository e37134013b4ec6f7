//! Tunable match parameters.

use rand::{rngs::SmallRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::ArenaError;

/// Static configuration for an arena match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArenaConfig {
    /// Board width in pixels.
    pub board_width: f32,
    /// Board height in pixels.
    pub board_height: f32,
    /// Optional RNG seed for reproducible matches.
    pub rng_seed: Option<u64>,
    /// Ticks between territory-share pushes and elimination checks.
    pub stats_interval: u32,
    pub grid: GridConfig,
    pub catalyst: CatalystConfig,
    pub targeting: TargetingConfig,
    pub power: PowerConfig,
    pub combat: CombatConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            board_width: 1_000.0,
            board_height: 700.0,
            rng_seed: None,
            stats_interval: 30,
            grid: GridConfig::default(),
            catalyst: CatalystConfig::default(),
            targeting: TargetingConfig::default(),
            power: PowerConfig::default(),
            combat: CombatConfig::default(),
        }
    }
}

/// Hex layout and majority-rule automaton parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    /// Hex circumradius in pixels.
    pub hex_radius: f32,
    /// Ticks between automaton advances.
    pub update_interval: u32,
    /// Strength lost per advance while outnumbered.
    pub decay_rate: f32,
    /// Strength gained per advance while holding.
    pub growth_rate: f32,
    /// Strength assigned at start and after a majority flip.
    pub default_strength: f32,
    /// Upper bound for cell strength; also the strength of agent-claimed cells.
    pub max_strength: f32,
    /// Colour transition progress added per advance.
    pub transition_speed: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            hex_radius: 15.0,
            update_interval: 5,
            decay_rate: 0.25,
            growth_rate: 0.15,
            default_strength: 3.0,
            max_strength: 5.0,
            transition_speed: 0.1,
        }
    }
}

impl GridConfig {
    /// Horizontal distance between neighbouring hex centres in a row.
    #[must_use]
    pub fn hex_width(&self) -> f32 {
        3.0_f32.sqrt() * self.hex_radius
    }

    /// Point-to-point hex height.
    #[must_use]
    pub fn hex_height(&self) -> f32 {
        self.hex_radius * 2.0
    }

    /// Vertical distance between consecutive rows.
    #[must_use]
    pub fn row_pitch(&self) -> f32 {
        self.hex_height() * 0.75
    }
}

/// Movement, perception and steering parameters shared by every catalyst.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalystConfig {
    pub radius: f32,
    pub max_speed: f32,
    /// Territory claim radius as a multiple of the hex radius.
    pub impact_radius: f32,
    pub predator_detection_range: f32,
    pub prey_detection_range: f32,
    pub flee_strength: f32,
    pub chase_strength: f32,
    pub territory_seek_strength: f32,
    /// Below this distance the current target counts as reached and is cleared.
    pub target_arrival_distance: f32,
    /// Extra speed cap multiplier while chasing.
    pub hunter_speed_boost: f32,
    /// Fraction of the normal velocity kept after bouncing off a wall.
    pub wall_restitution: f32,
    /// Half-width of the uniform range used for respawn velocity components.
    pub respawn_velocity_jitter: f32,
}

impl Default for CatalystConfig {
    fn default() -> Self {
        Self {
            radius: 14.0,
            max_speed: 3.5,
            impact_radius: 2.5,
            predator_detection_range: 150.0,
            prey_detection_range: 200.0,
            flee_strength: 0.3,
            chase_strength: 0.08,
            territory_seek_strength: 0.05,
            target_arrival_distance: 50.0,
            hunter_speed_boost: 1.2,
            wall_restitution: 0.9,
            respawn_velocity_jitter: 2.0,
        }
    }
}

/// Stochastic enemy-cell search parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TargetingConfig {
    pub search_attempts: u32,
    /// Per-tick probability of searching while hunting.
    pub reacquire_chance: f32,
    pub distance_normalizer: f32,
    /// Score multiplier for cells of a faction whose catalyst is dead.
    pub dead_enemy_priority: f32,
    /// Score multiplier for the trailing faction's cells while ganging up.
    pub gang_up_bias: f32,
    /// Weight of the low-strength bonus.
    pub weakness_weight: f32,
    /// Score multiplier for candidates touching friendly territory.
    pub border_bonus: f32,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            search_attempts: 20,
            reacquire_chance: 0.02,
            distance_normalizer: 1_000.0,
            dead_enemy_priority: 2.0,
            gang_up_bias: 3.0,
            weakness_weight: 1.0,
            border_bonus: 1.5,
        }
    }
}

/// Territory tiers, last stand, kill streaks, respawn and elimination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PowerConfig {
    pub dominant_threshold: f32,
    pub dominant_speed_bonus: f32,
    pub dominant_impact_bonus: f32,
    pub weak_threshold: f32,
    pub weak_speed_penalty: f32,
    pub last_stand_threshold: f32,
    pub last_stand_duration: u32,
    pub last_stand_speed_bonus: f32,
    pub last_stand_impact_bonus: f32,
    /// Maximum ticks between kills for the streak to continue.
    pub kill_streak_window: u32,
    pub streak_speed_bonus: f32,
    pub streak_impact_bonus: f32,
    pub respawn_base_delay: u32,
    /// Extra ticks per 10%-of-weak-threshold step below the weak threshold.
    pub respawn_penalty_per_step: u32,
    pub respawn_max_delay: u32,
    /// Share at or below which a faction is permanently eliminated.
    pub elimination_threshold: f32,
    /// Leader-to-trailer share gap that triggers gang-up.
    pub gang_up_threshold: f32,
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            dominant_threshold: 0.40,
            dominant_speed_bonus: 1.2,
            dominant_impact_bonus: 1.3,
            weak_threshold: 0.20,
            weak_speed_penalty: 0.85,
            last_stand_threshold: 0.10,
            last_stand_duration: 600,
            last_stand_speed_bonus: 1.5,
            last_stand_impact_bonus: 1.6,
            kill_streak_window: 300,
            streak_speed_bonus: 1.15,
            streak_impact_bonus: 1.25,
            respawn_base_delay: 180,
            respawn_penalty_per_step: 30,
            respawn_max_delay: 480,
            elimination_threshold: 0.01,
            gang_up_threshold: 0.15,
        }
    }
}

/// Pairwise collision parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CombatConfig {
    /// Added to the sum of radii when testing contact.
    pub padding: f32,
    /// Amplification applied to exchanged normal velocities.
    pub bounce_factor: f32,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            padding: 10.0,
            bounce_factor: 1.1,
        }
    }
}

fn non_negative(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite() && *v >= 0.0)
}

fn unit_interval(values: &[f32]) -> bool {
    values.iter().all(|v| (0.0..=1.0).contains(v))
}

impl ArenaConfig {
    /// Validates every section, returning the first problem found.
    pub fn validate(&self) -> Result<(), ArenaError> {
        let board_ok = |v: f32| v.is_finite() && v > 0.0;
        if !(board_ok(self.board_width) && board_ok(self.board_height)) {
            return Err(ArenaError::InvalidConfig(
                "board dimensions must be positive and finite",
            ));
        }
        if self.stats_interval == 0 {
            return Err(ArenaError::InvalidConfig("stats_interval must be non-zero"));
        }

        let grid = &self.grid;
        if !(grid.hex_radius.is_finite() && grid.hex_radius > 0.0) {
            return Err(ArenaError::InvalidConfig(
                "hex_radius must be positive and finite",
            ));
        }
        if grid.update_interval == 0 {
            return Err(ArenaError::InvalidConfig(
                "grid update_interval must be non-zero",
            ));
        }
        if !(grid.decay_rate > 0.0) || !non_negative(&[grid.growth_rate, grid.transition_speed])
        {
            return Err(ArenaError::InvalidConfig(
                "decay_rate must be positive, growth and transition speed non-negative",
            ));
        }
        if !(grid.default_strength > 0.0 && grid.default_strength <= grid.max_strength) {
            return Err(ArenaError::InvalidConfig(
                "default_strength must be in (0, max_strength]",
            ));
        }

        let cat = &self.catalyst;
        if !(cat.radius > 0.0 && cat.max_speed > 0.0 && cat.impact_radius > 0.0) {
            return Err(ArenaError::InvalidConfig(
                "catalyst radius, max_speed and impact_radius must be positive",
            ));
        }
        if self.board_width <= 2.0 * cat.radius || self.board_height <= 2.0 * cat.radius {
            return Err(ArenaError::InvalidConfig(
                "board must be wider and taller than a catalyst",
            ));
        }
        if !(cat.predator_detection_range > 0.0 && cat.prey_detection_range > 0.0) {
            return Err(ArenaError::InvalidConfig("detection ranges must be positive"));
        }
        if !non_negative(&[
            cat.flee_strength,
            cat.chase_strength,
            cat.territory_seek_strength,
            cat.target_arrival_distance,
            cat.hunter_speed_boost,
            cat.respawn_velocity_jitter,
        ]) {
            return Err(ArenaError::InvalidConfig(
                "steering strengths and speed boosts must be non-negative",
            ));
        }
        if !(cat.wall_restitution >= 0.0 && cat.wall_restitution < 1.0) {
            return Err(ArenaError::InvalidConfig(
                "wall_restitution must be in [0, 1)",
            ));
        }

        let targeting = &self.targeting;
        if targeting.search_attempts == 0 || !(targeting.distance_normalizer > 0.0) {
            return Err(ArenaError::InvalidConfig(
                "search_attempts and distance_normalizer must be positive",
            ));
        }
        if !unit_interval(&[targeting.reacquire_chance]) {
            return Err(ArenaError::InvalidConfig("reacquire_chance must be in [0, 1]"));
        }
        if !non_negative(&[
            targeting.dead_enemy_priority,
            targeting.gang_up_bias,
            targeting.weakness_weight,
            targeting.border_bonus,
        ]) {
            return Err(ArenaError::InvalidConfig(
                "targeting multipliers must be non-negative",
            ));
        }

        let power = &self.power;
        if !unit_interval(&[
            power.dominant_threshold,
            power.weak_threshold,
            power.last_stand_threshold,
            power.elimination_threshold,
            power.gang_up_threshold,
        ]) {
            return Err(ArenaError::InvalidConfig(
                "territory thresholds must be fractions in [0, 1]",
            ));
        }
        if !(power.elimination_threshold < power.last_stand_threshold
            && power.last_stand_threshold <= power.weak_threshold
            && power.weak_threshold < power.dominant_threshold)
        {
            return Err(ArenaError::InvalidConfig(
                "thresholds must satisfy elimination < last stand <= weak < dominant",
            ));
        }
        if power.last_stand_duration == 0 {
            return Err(ArenaError::InvalidConfig(
                "last_stand_duration must be non-zero",
            ));
        }
        if power.respawn_max_delay < power.respawn_base_delay {
            return Err(ArenaError::InvalidConfig(
                "respawn_max_delay cannot be below respawn_base_delay",
            ));
        }
        if !non_negative(&[
            power.dominant_speed_bonus,
            power.dominant_impact_bonus,
            power.weak_speed_penalty,
            power.last_stand_speed_bonus,
            power.last_stand_impact_bonus,
            power.streak_speed_bonus,
            power.streak_impact_bonus,
        ]) {
            return Err(ArenaError::InvalidConfig(
                "power multipliers must be non-negative",
            ));
        }

        if !non_negative(&[self.combat.padding, self.combat.bounce_factor]) {
            return Err(ArenaError::InvalidConfig(
                "collision padding and bounce factor must be non-negative",
            ));
        }
        Ok(())
    }

    /// Returns the configured RNG, seeding one from entropy if absent.
    #[must_use]
    pub fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }

    /// Spawn points and opening velocities, one per faction in index order.
    #[must_use]
    pub fn spawn_layout(&self) -> [(crate::Position, crate::Velocity); 3] {
        use crate::{Position, Velocity};
        let y = self.board_height * 0.5;
        [
            (
                Position::new(self.board_width * 0.17, y),
                Velocity::new(2.2, 1.5),
            ),
            (
                Position::new(self.board_width * 0.5, y),
                Velocity::new(-1.5, 2.2),
            ),
            (
                Position::new(self.board_width * 0.83, y),
                Velocity::new(-2.2, -1.5),
            ),
        ]
    }
}
