//! Three-phase boss fight.
//!
//! Phases only move forward: `Navigate` ends on a timer, `SpiritOrbs` ends
//! after enough orbs hit, `BarrelPursuit` runs a fixed script and ends in
//! defeat. Damage that empties health defeats the boss from any phase. A
//! defeated boss fades out before `BossDefeated` is announced.

use tracing::{debug, info, warn};

use crate::config::BossConfig;
use crate::constants::{PHASE3_SPEED_FACTOR, SLOWED_SPEED_FACTOR, VINES_PER_CLUSTER};
use crate::rng::RandomSource;
use crate::types::{BossEvent, BossPhase, BossView, HazardView, Vec2};
use crate::world::BossArena;

mod hazards;
mod script;

pub use self::hazards::{HazardField, HazardTick};
pub use self::script::{BarrelScript, ScriptAction};

/// Where spirit orbs are spent from.
pub trait SpiritOrbPool {
    /// Takes one orb if any is left.
    fn try_consume(&mut self) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpiritOrbs {
    count: u32,
}

impl SpiritOrbs {
    pub fn new(count: u32) -> Self {
        Self { count }
    }

    pub fn collect(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl SpiritOrbPool for SpiritOrbs {
    fn try_consume(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.count -= 1;
        true
    }
}

pub struct BossController {
    config: BossConfig,
    rng: Box<dyn RandomSource + Send>,
    spawn_points: Vec<Vec2>,
    barrel_spawn: Vec2,
    active: bool,
    finished: bool,
    phase: BossPhase,
    health: f32,
    position: Vec2,
    is_slowed: bool,
    slow_timer: f32,
    orbs_used_in_phase2: u32,
    barrels_launched: u32,
    phase_timer: f32,
    spawn_accumulator: f32,
    script: Option<BarrelScript>,
    fade_elapsed: f32,
    hazards: HazardField,
    events: Vec<BossEvent>,
}

impl BossController {
    pub fn new(config: BossConfig, rng: Box<dyn RandomSource + Send>) -> Self {
        Self {
            health: config.max_health,
            config,
            rng,
            spawn_points: Vec::new(),
            barrel_spawn: Vec2::ZERO,
            active: false,
            finished: false,
            phase: BossPhase::Navigate,
            position: Vec2::ZERO,
            is_slowed: false,
            slow_timer: 0.0,
            orbs_used_in_phase2: 0,
            barrels_launched: 0,
            phase_timer: 0.0,
            spawn_accumulator: 0.0,
            script: None,
            fade_elapsed: 0.0,
            hazards: HazardField::new(),
            events: Vec::new(),
        }
    }

    pub fn start(&mut self, arena: &BossArena) {
        if arena.obstacle_spawn_points.is_empty() {
            warn!(arena = %arena.name, "arena has no obstacle spawn points, obstacles disabled");
        }
        self.spawn_points = arena.obstacle_spawn_points.clone();
        self.barrel_spawn = arena.barrel_spawn;
        self.position = arena.boss_spawn;
        self.active = true;
        self.finished = false;
        self.phase = BossPhase::Navigate;
        self.health = self.config.max_health;
        self.is_slowed = false;
        self.slow_timer = 0.0;
        self.orbs_used_in_phase2 = 0;
        self.barrels_launched = 0;
        self.phase_timer = 0.0;
        self.spawn_accumulator = self.config.obstacle_spawn_interval;
        self.script = None;
        self.fade_elapsed = 0.0;
        self.hazards.clear();

        self.events.push(BossEvent::PhaseChanged { phase: self.phase });
        self.push_health();
        info!(arena = %arena.name, health = self.health, "boss fight started");
    }

    /// Abandons the fight without announcing a defeat.
    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            self.hazards.clear();
            info!(phase = ?self.phase, "boss fight stopped");
        }
    }

    pub fn tick(&mut self, dt: f32, player: Vec2) {
        if !self.active {
            return;
        }

        if self.phase == BossPhase::Defeated {
            self.tick_hazards(dt, player);
            self.tick_defeat_fade(dt);
            return;
        }

        if self.is_slowed {
            self.slow_timer -= dt;
            if self.slow_timer <= 0.0 {
                self.slow_timer = 0.0;
                self.is_slowed = false;
                debug!("boss slow wore off");
            }
        }

        match self.phase {
            BossPhase::Navigate => {
                self.drift(player, self.config.phase1_speed, dt);
                while self.spawn_accumulator >= self.config.obstacle_spawn_interval {
                    self.spawn_accumulator -= self.config.obstacle_spawn_interval;
                    self.spawn_obstacle();
                }
                self.spawn_accumulator += dt;
                self.phase_timer += dt;
                if self.phase_timer >= self.config.phase1_duration {
                    self.advance_to(BossPhase::SpiritOrbs);
                }
            }
            BossPhase::SpiritOrbs => {
                self.drift(player, self.config.phase2_speed, dt);
            }
            BossPhase::BarrelPursuit => {
                self.drift(player, self.config.phase2_speed * PHASE3_SPEED_FACTOR, dt);
                let actions = self
                    .script
                    .as_mut()
                    .map(|script| script.tick(dt))
                    .unwrap_or_default();
                for action in actions {
                    self.run_script_action(action, player);
                }
            }
            BossPhase::Defeated => {}
        }

        self.tick_hazards(dt, player);
    }

    /// Spends one orb from `pool` on the boss. Only does anything during the
    /// spirit-orb phase, and never consumes an orb otherwise.
    pub fn use_spirit_orb(&mut self, pool: &mut dyn SpiritOrbPool, from: Vec2) -> bool {
        if !self.active || self.phase != BossPhase::SpiritOrbs {
            debug!(phase = ?self.phase, "spirit orb ignored outside orb phase");
            return false;
        }
        if !pool.try_consume() {
            debug!("spirit orb ignored: pool is empty");
            return false;
        }

        self.orbs_used_in_phase2 += 1;
        self.is_slowed = true;
        self.slow_timer = self.config.orb_slow_duration;
        let orb = self.hazards.spawn_orb(from);
        self.push_spawned(&orb);
        self.take_damage(self.config.max_health * self.config.orb_damage_fraction);

        if self.phase == BossPhase::SpiritOrbs
            && self.orbs_used_in_phase2 >= self.config.orbs_to_advance
        {
            self.advance_to(BossPhase::BarrelPursuit);
        }
        true
    }

    pub fn take_damage(&mut self, amount: f32) {
        if !self.active || self.phase == BossPhase::Defeated {
            return;
        }
        let amount = amount.max(0.0);
        self.health = (self.health - amount).clamp(0.0, self.config.max_health);
        self.push_health();
        debug!(amount, health = self.health, "boss damaged");
        if self.health <= 0.0 {
            self.begin_defeat();
        }
    }

    pub fn phase(&self) -> BossPhase {
        self.phase
    }

    pub fn current_health(&self) -> f32 {
        self.health
    }

    pub fn max_health(&self) -> f32 {
        self.config.max_health
    }

    pub fn is_slowed(&self) -> bool {
        self.is_slowed
    }

    pub fn orbs_used_in_phase2(&self) -> u32 {
        self.orbs_used_in_phase2
    }

    pub fn barrels_launched(&self) -> u32 {
        self.barrels_launched
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn hazards(&self) -> &HazardField {
        &self.hazards
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once the defeat fade has played out.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn drain_events(&mut self) -> Vec<BossEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn view(&self) -> BossView {
        BossView {
            phase: self.phase,
            health: self.health,
            max_health: self.config.max_health,
            is_slowed: self.is_slowed,
            orbs_used_in_phase2: self.orbs_used_in_phase2,
            barrels_launched: self.barrels_launched,
            x: self.position.x,
            y: self.position.y,
            alpha: self.alpha(),
            hazards: self.hazards.views(),
        }
    }

    fn alpha(&self) -> f32 {
        if self.phase != BossPhase::Defeated {
            return 1.0;
        }
        if self.finished || self.config.defeat_fade_duration <= 0.0 {
            return 0.0;
        }
        (1.0 - self.fade_elapsed / self.config.defeat_fade_duration).clamp(0.0, 1.0)
    }

    fn drift(&mut self, player: Vec2, base_speed: f32, dt: f32) {
        let speed = if self.is_slowed {
            base_speed * SLOWED_SPEED_FACTOR
        } else {
            base_speed
        };
        self.position = self.position.move_towards(player, speed * dt);
    }

    fn spawn_obstacle(&mut self) {
        let spawned = self.hazards.spawn_obstacle(
            &self.spawn_points,
            self.rng.as_mut(),
            self.config.obstacle_lifetime,
        );
        if let Some(obstacle) = spawned {
            self.push_spawned(&obstacle);
        }
    }

    fn run_script_action(&mut self, action: ScriptAction, player: Vec2) {
        match action {
            ScriptAction::LaunchBarrel => {
                let barrel = self.hazards.spawn_barrel(
                    self.barrel_spawn,
                    self.config.barrel_speed,
                    self.config.barrel_lifetime,
                );
                self.barrels_launched += 1;
                self.push_spawned(&barrel);
                debug!(barrels = self.barrels_launched, "spiked barrel launched");
            }
            ScriptAction::SpawnVines => {
                let vines = self.hazards.spawn_vine_cluster(
                    player,
                    VINES_PER_CLUSTER,
                    self.rng.as_mut(),
                    self.config.vine_lifetime,
                );
                for vine in &vines {
                    self.push_spawned(vine);
                }
            }
            ScriptAction::Finish => self.begin_defeat(),
        }
    }

    fn tick_hazards(&mut self, dt: f32, player: Vec2) {
        let result = self.hazards.tick(dt, player, self.position);
        for hazard_id in result.player_hits {
            self.events.push(BossEvent::PlayerHit { hazard_id });
        }
    }

    fn tick_defeat_fade(&mut self, dt: f32) {
        self.fade_elapsed += dt;
        if self.fade_elapsed < self.config.defeat_fade_duration {
            return;
        }
        self.finished = true;
        self.active = false;
        self.hazards.clear();
        self.events.push(BossEvent::BossDefeated);
        info!("boss defeated");
    }

    fn advance_to(&mut self, next: BossPhase) {
        if next <= self.phase {
            debug_assert!(false, "boss phase may not move from {:?} to {:?}", self.phase, next);
            return;
        }
        info!(from = ?self.phase, to = ?next, "boss phase changed");
        self.phase = next;
        self.phase_timer = 0.0;
        match next {
            BossPhase::SpiritOrbs => self.orbs_used_in_phase2 = 0,
            BossPhase::BarrelPursuit => {
                self.barrels_launched = 0;
                self.script = Some(BarrelScript::from_config(&self.config));
            }
            BossPhase::Navigate | BossPhase::Defeated => {}
        }
        self.events.push(BossEvent::PhaseChanged { phase: next });
    }

    fn begin_defeat(&mut self) {
        if self.phase == BossPhase::Defeated {
            return;
        }
        self.script = None;
        self.is_slowed = false;
        self.fade_elapsed = 0.0;
        self.advance_to(BossPhase::Defeated);
    }

    fn push_health(&mut self) {
        self.events.push(BossEvent::HealthChanged {
            current: self.health,
            max: self.config.max_health,
        });
    }

    fn push_spawned(&mut self, hazard: &HazardView) {
        self.events.push(BossEvent::HazardSpawned {
            id: hazard.id,
            kind: hazard.kind,
            x: hazard.x,
            y: hazard.y,
        });
    }
}
