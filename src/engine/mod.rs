use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::boss::{BossController, SpiritOrbs};
use crate::clock::TimingSource;
use crate::config::SimConfig;
use crate::error::ConfigError;
use crate::rhythm::{BeatMap, BeatMapParams, RhythmEngine};
use crate::rng::Rng;
use crate::stealth::{PlayerAvatar, StealthManager, StealthTarget};
use crate::types::{InputKey, RhythmState, RuntimeEvent, Snapshot, Vec2};
use crate::world::{BossArena, StealthStage};

mod utils;

use self::utils::{derive_seed, forward_events};

const BOSS_SEED_SALT: u32 = 0xb055;

/// Hosts the three encounter systems behind one tick loop. Inputs are queued
/// and applied on the next `step`; `step` ticks rhythm, then stealth, then
/// the boss.
pub struct GameEngine {
    pub config: SimConfig,
    pub seed: u32,

    clock: Arc<dyn TimingSource>,
    rng: Rng,
    rhythm: RhythmEngine,
    stealth: StealthManager,
    boss: BossController,
    player: PlayerAvatar,
    spirit_orbs: SpiritOrbs,
    pending_press: Option<InputKey>,
    paused: bool,
    tick_counter: u64,
    elapsed_seconds: f64,
    events: Vec<RuntimeEvent>,
}

impl GameEngine {
    pub fn new(config: SimConfig, clock: Arc<dyn TimingSource>, seed: u32) -> Self {
        let rhythm = RhythmEngine::new(config.rhythm.clone(), Arc::clone(&clock));
        let stealth = StealthManager::new(config.stealth.clone());
        let boss = BossController::new(
            config.boss.clone(),
            Box::new(Rng::new(derive_seed(seed, BOSS_SEED_SALT))),
        );
        Self {
            config,
            seed,
            clock,
            rng: Rng::new(seed),
            rhythm,
            stealth,
            boss,
            player: PlayerAvatar::new(Vec2::ZERO),
            spirit_orbs: SpiritOrbs::default(),
            pending_press: None,
            paused: false,
            tick_counter: 0,
            elapsed_seconds: 0.0,
            events: Vec::new(),
        }
    }

    /// Starts a pounding sequence on a freshly generated beat map.
    pub fn start_rhythm(&mut self) -> Result<(), ConfigError> {
        let params = BeatMapParams::from(&self.config.rhythm);
        let map = BeatMap::generated(&params, &mut self.rng);
        self.start_rhythm_with(map)
    }

    pub fn start_rhythm_with(&mut self, map: BeatMap) -> Result<(), ConfigError> {
        self.pending_press = None;
        self.rhythm.start(map)
    }

    pub fn start_stealth(&mut self, stage: &StealthStage) {
        if let Err(error) = stage.validate() {
            warn!(stage = %stage.name, %error, "stealth stage is incomplete");
        }
        self.player = PlayerAvatar::new(stage.player_spawn);
        self.stealth.start(stage);
    }

    pub fn start_boss(&mut self, arena: &BossArena) {
        self.player = PlayerAvatar::new(arena.player_spawn);
        self.boss.start(arena);
    }

    pub fn stop_rhythm(&mut self) {
        self.rhythm.stop();
    }

    pub fn stop_stealth(&mut self) {
        self.stealth.stop();
    }

    pub fn stop_boss(&mut self) {
        self.boss.stop();
    }

    pub fn stop_all(&mut self) {
        self.stop_rhythm();
        self.stop_stealth();
        self.stop_boss();
    }

    pub fn press(&mut self, key: InputKey) {
        if self.paused {
            return;
        }
        self.pending_press = Some(key);
    }

    pub fn resolve_vision_choice(&mut self, choice_index: usize) -> bool {
        let resolved = self.rhythm.resolve_vision_choice(choice_index);
        self.forward_rhythm_events();
        resolved
    }

    pub fn move_player(&mut self, delta: Vec2) -> bool {
        if self.paused {
            return false;
        }
        self.player.move_by(delta)
    }

    /// Hides the player in the closest spot within reach.
    pub fn enter_hiding_spot(&mut self) -> bool {
        if self.paused || !self.stealth.is_active() || self.player.is_hidden() {
            return false;
        }
        let Some(index) = self.stealth.hiding_spot_near(self.player.position()) else {
            debug!("no hiding spot within reach");
            return false;
        };
        let Some(spot) = self.stealth.hiding_spot(index).cloned() else {
            return false;
        };
        debug!(spot = %spot.name, "player hid");
        self.player.hide(index, &spot);
        true
    }

    pub fn exit_hiding_spot(&mut self) -> bool {
        self.player.unhide()
    }

    pub fn collect_spirit_orb(&mut self) {
        self.spirit_orbs.collect();
    }

    pub fn use_spirit_orb(&mut self) -> bool {
        if self.paused {
            return false;
        }
        let used = self
            .boss
            .use_spirit_orb(&mut self.spirit_orbs, self.player.position());
        self.forward_boss_events();
        used
    }

    pub fn damage_boss(&mut self, amount: f32) {
        self.boss.take_damage(amount);
        self.forward_boss_events();
    }

    /// Coarse pause: every subsystem stands still, the rhythm judge clock
    /// included.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        self.pending_press = None;
        self.rhythm.set_paused(paused);
        info!(paused, "game pause toggled");
    }

    pub fn step(&mut self, dt: f32) {
        if self.paused {
            return;
        }
        self.tick_counter += 1;
        self.elapsed_seconds += f64::from(dt);

        self.player.tick(dt);

        self.rhythm.tick(self.pending_press.take());
        self.forward_rhythm_events();

        self.stealth.tick(dt, &mut self.player);
        forward_events(
            &mut self.events,
            self.stealth.drain_events(),
            RuntimeEvent::Stealth,
        );

        self.boss.tick(dt, self.player.position());
        self.forward_boss_events();
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            elapsed_seconds: self.elapsed_seconds,
            paused: self.paused,
            player: self.player.view(),
            spirit_orbs: self.spirit_orbs.count(),
            rhythm: (self.rhythm.state() != RhythmState::Idle).then(|| self.rhythm.view()),
            stealth: (!self.stealth.agents().is_empty()).then(|| self.stealth.view()),
            boss: (self.boss.is_active() || self.boss.is_finished()).then(|| self.boss.view()),
            events: if include_events {
                self.events.clone()
            } else {
                Vec::new()
            },
        };
        if include_events {
            self.events.clear();
        }
        snapshot
    }

    pub fn rhythm(&self) -> &RhythmEngine {
        &self.rhythm
    }

    pub fn stealth(&self) -> &StealthManager {
        &self.stealth
    }

    pub fn boss(&self) -> &BossController {
        &self.boss
    }

    pub fn player(&self) -> &PlayerAvatar {
        &self.player
    }

    pub fn spirit_orbs(&self) -> u32 {
        self.spirit_orbs.count()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    fn forward_rhythm_events(&mut self) {
        forward_events(
            &mut self.events,
            self.rhythm.drain_events(),
            RuntimeEvent::Rhythm,
        );
    }

    fn forward_boss_events(&mut self) {
        forward_events(&mut self.events, self.boss.drain_events(), RuntimeEvent::Boss);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::{BeatRating, BossEvent, BossPhase, RhythmEvent, StealthEvent};
    use crate::world::{confrontation_arena, descent_stage};

    fn make_engine(seed: u32) -> (GameEngine, ManualClock) {
        let clock = ManualClock::new(0.0);
        let engine = GameEngine::new(SimConfig::default(), Arc::new(clock.clone()), seed);
        (engine, clock)
    }

    #[test]
    fn build_snapshot_drains_events_when_requested() {
        let (mut engine, _clock) = make_engine(1);
        engine.start_boss(&confrontation_arena());
        engine.step(1.0 / 60.0);

        let peek = engine.build_snapshot(false);
        assert!(peek.events.is_empty());
        let first = engine.build_snapshot(true);
        let second = engine.build_snapshot(true);
        assert!(first.events.contains(&RuntimeEvent::Boss(BossEvent::PhaseChanged {
            phase: BossPhase::Navigate
        })));
        assert!(second.events.is_empty());
    }

    #[test]
    fn queued_press_is_judged_on_next_step() {
        let (mut engine, clock) = make_engine(2);
        engine.start_rhythm().expect("default map starts");
        let deadline = engine.rhythm().current_deadline().expect("first beat");
        let key = engine.rhythm().beats()[0].required_input;

        clock.set(deadline);
        engine.press(key);
        engine.step(1.0 / 60.0);

        let snapshot = engine.build_snapshot(true);
        assert!(snapshot.events.contains(&RuntimeEvent::Rhythm(RhythmEvent::BeatResult {
            beat_index: 0,
            rating: BeatRating::Perfect,
            offset: 0.0,
        })));
        let rhythm = snapshot.rhythm.expect("rhythm view present once started");
        assert_eq!(rhythm.perfect_count, 1);
        assert_eq!(rhythm.current_beat_index, 1);
    }

    #[test]
    fn pause_freezes_every_subsystem() {
        let (mut engine, clock) = make_engine(3);
        engine.start_rhythm().expect("default map starts");
        engine.start_boss(&confrontation_arena());
        engine.set_paused(true);

        clock.advance(20.0);
        for _ in 0..120 {
            engine.step(0.5);
        }
        assert_eq!(engine.tick_count(), 0);
        assert_eq!(engine.rhythm().counts(), (0, 0, 0));
        assert_eq!(engine.boss().phase(), BossPhase::Navigate);

        engine.set_paused(false);
        let deadline = engine.rhythm().current_deadline().expect("first beat");
        assert!(deadline > 20.0);
    }

    #[test]
    fn hiding_requires_a_nearby_spot() {
        let (mut engine, _clock) = make_engine(4);
        engine.start_stealth(&descent_stage());
        assert!(!engine.enter_hiding_spot());

        engine.move_player(Vec2::new(4.2, -0.3));
        assert!(engine.enter_hiding_spot());
        assert!(engine.player().is_hidden());
        assert_eq!(engine.player().position(), Vec2::new(-7.0, -1.8));
        assert!(!engine.move_player(Vec2::RIGHT));
        assert!(engine.exit_hiding_spot());
        assert!(engine.move_player(Vec2::RIGHT));
    }

    #[test]
    fn stealth_catch_surfaces_in_snapshot() {
        let (mut engine, _clock) = make_engine(5);
        let mut stage = descent_stage();
        stage.player_spawn = Vec2::new(2.0, -1.5);
        engine.start_stealth(&stage);

        let mut events = Vec::new();
        for _ in 0..600 {
            engine.step(1.0 / 60.0);
            events.extend(engine.build_snapshot(true).events);
        }
        assert!(events.iter().any(|event| matches!(
            event,
            RuntimeEvent::Stealth(StealthEvent::PlayerDetected { .. })
        )));
        assert!(engine.stealth().catch_count() >= 1);
    }

    #[test]
    fn spirit_orbs_flow_from_pool_to_boss() {
        let (mut engine, _clock) = make_engine(6);
        engine.start_boss(&confrontation_arena());
        for _ in 0..3 {
            engine.collect_spirit_orb();
        }
        assert!(!engine.use_spirit_orb());
        assert_eq!(engine.spirit_orbs(), 3);

        for _ in 0..60 {
            engine.step(0.5);
        }
        assert_eq!(engine.boss().phase(), BossPhase::SpiritOrbs);
        for _ in 0..3 {
            assert!(engine.use_spirit_orb());
        }
        assert_eq!(engine.spirit_orbs(), 0);
        assert_eq!(engine.boss().phase(), BossPhase::BarrelPursuit);
        assert!((engine.boss().current_health() - 55.0).abs() < 1e-3);
    }

    #[test]
    fn snapshot_sections_appear_only_once_started() {
        let (mut engine, _clock) = make_engine(7);
        let snapshot = engine.build_snapshot(false);
        assert!(snapshot.rhythm.is_none());
        assert!(snapshot.stealth.is_none());
        assert!(snapshot.boss.is_none());

        let json = serde_json::to_value(&snapshot).expect("snapshot serializes");
        assert_eq!(json["spiritOrbs"], 0);
        assert!(json["rhythm"].is_null());
    }
}
