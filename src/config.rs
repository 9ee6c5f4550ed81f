use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::*;
use crate::error::ConfigError;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RhythmConfig {
    pub total_beats: usize,
    pub start_bpm: f32,
    pub max_bpm: f32,
    pub bpm_increase_per_beat: f32,
    pub base_hit_window: f32,
    pub min_hit_window: f32,
    pub perfect_window_ratio: f32,
    pub exhaustion_start: f32,
    pub exhaustion_hit_cost: f32,
    pub exhaustion_miss_cost: f32,
    pub vision_beat_threshold: usize,
    pub lead_in_seconds: f64,
    pub approach_lead_seconds: f64,
}

impl Default for RhythmConfig {
    fn default() -> Self {
        Self {
            total_beats: DEFAULT_TOTAL_BEATS,
            start_bpm: BASE_BPM,
            max_bpm: MAX_BPM,
            bpm_increase_per_beat: BPM_INCREASE_PER_BEAT,
            base_hit_window: BASE_HIT_WINDOW,
            min_hit_window: MIN_HIT_WINDOW,
            perfect_window_ratio: PERFECT_WINDOW_RATIO,
            exhaustion_start: EXHAUSTION_START,
            exhaustion_hit_cost: EXHAUSTION_HIT_COST,
            exhaustion_miss_cost: EXHAUSTION_MISS_COST,
            vision_beat_threshold: VISION_BEAT_THRESHOLD,
            lead_in_seconds: SEQUENCE_LEAD_IN_SECONDS,
            approach_lead_seconds: BEAT_APPROACH_LEAD_SECONDS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StealthConfig {
    pub max_catches: u32,
    pub detection_radius: f32,
    pub detection_angle_deg: f32,
    pub patrol_speed: f32,
    pub chase_speed: f32,
    pub catch_distance: f32,
    pub wait_at_waypoint: f32,
    pub alert_range_ratio: f32,
    pub suspicion_timeout: f32,
    pub search_timeout: f32,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            max_catches: MAX_CATCHES,
            detection_radius: DETECTION_RADIUS,
            detection_angle_deg: DETECTION_ANGLE_DEG,
            patrol_speed: PATROL_SPEED,
            chase_speed: CHASE_SPEED,
            catch_distance: CATCH_DISTANCE,
            wait_at_waypoint: WAIT_AT_WAYPOINT_SECONDS,
            alert_range_ratio: ALERT_RANGE_RATIO,
            suspicion_timeout: SUSPICION_TIMEOUT_SECONDS,
            search_timeout: SEARCH_TIMEOUT_SECONDS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BossConfig {
    pub max_health: f32,
    pub phase1_duration: f32,
    pub phase1_speed: f32,
    pub phase2_speed: f32,
    pub obstacle_spawn_interval: f32,
    pub obstacle_lifetime: f32,
    pub orb_damage_fraction: f32,
    pub orb_slow_duration: f32,
    pub orbs_to_advance: u32,
    pub barrel_repetitions: u32,
    pub barrel_speed: f32,
    pub barrel_lifetime: f32,
    pub vine_lifetime: f32,
    pub defeat_fade_duration: f32,
}

impl Default for BossConfig {
    fn default() -> Self {
        Self {
            max_health: BOSS_MAX_HEALTH,
            phase1_duration: PHASE1_DURATION_SECONDS,
            phase1_speed: PHASE1_MOVE_SPEED,
            phase2_speed: PHASE2_MOVE_SPEED,
            obstacle_spawn_interval: OBSTACLE_SPAWN_INTERVAL_SECONDS,
            obstacle_lifetime: OBSTACLE_LIFETIME_SECONDS,
            orb_damage_fraction: ORB_DAMAGE_FRACTION,
            orb_slow_duration: ORB_SLOW_DURATION_SECONDS,
            orbs_to_advance: ORBS_TO_ADVANCE,
            barrel_repetitions: BARREL_REPETITIONS,
            barrel_speed: BARREL_SPEED,
            barrel_lifetime: BARREL_LIFETIME_SECONDS,
            vine_lifetime: VINE_LIFETIME_SECONDS,
            defeat_fade_duration: DEFEAT_FADE_SECONDS,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimConfig {
    pub tick_rate: u32,
    pub rhythm: RhythmConfig,
    pub stealth: StealthConfig,
    pub boss: BossConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            rhythm: RhythmConfig::default(),
            stealth: StealthConfig::default(),
            boss: BossConfig::default(),
        }
    }
}

impl SimConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn tick_seconds(&self) -> f32 {
        1.0 / self.tick_rate.max(1) as f32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 || self.tick_rate > 240 {
            return Err(ConfigError::invalid("tickRate", "must be within 1..=240"));
        }
        self.rhythm.validate()?;
        self.stealth.validate()?;
        self.boss.validate()
    }
}

impl RhythmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.total_beats == 0 || self.total_beats > MAX_TOTAL_BEATS {
            return Err(ConfigError::invalid(
                "rhythm.totalBeats",
                format!("must be within 1..={MAX_TOTAL_BEATS}"),
            ));
        }
        if self.start_bpm <= 0.0 || self.max_bpm < self.start_bpm {
            return Err(ConfigError::invalid(
                "rhythm.startBpm",
                "must be positive and not above maxBpm",
            ));
        }
        if self.bpm_increase_per_beat < 0.0 {
            return Err(ConfigError::invalid(
                "rhythm.bpmIncreasePerBeat",
                "must not be negative",
            ));
        }
        if self.min_hit_window <= 0.0 || self.base_hit_window < self.min_hit_window {
            return Err(ConfigError::invalid(
                "rhythm.baseHitWindow",
                "must be at least minHitWindow, which must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.perfect_window_ratio) {
            return Err(ConfigError::invalid(
                "rhythm.perfectWindowRatio",
                "must be within 0..=1",
            ));
        }
        if self.exhaustion_start <= 0.0
            || self.exhaustion_hit_cost < 0.0
            || self.exhaustion_miss_cost < 0.0
        {
            return Err(ConfigError::invalid(
                "rhythm.exhaustion",
                "start must be positive and costs must not be negative",
            ));
        }
        if self.vision_beat_threshold == 0 {
            return Err(ConfigError::invalid(
                "rhythm.visionBeatThreshold",
                "must be positive",
            ));
        }
        if self.lead_in_seconds < 0.0 {
            return Err(ConfigError::invalid(
                "rhythm.leadInSeconds",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

impl StealthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_catches == 0 {
            return Err(ConfigError::invalid("stealth.maxCatches", "must be positive"));
        }
        if self.detection_radius <= 0.0 {
            return Err(ConfigError::invalid(
                "stealth.detectionRadius",
                "must be positive",
            ));
        }
        if !(0.0..=180.0).contains(&self.detection_angle_deg) {
            return Err(ConfigError::invalid(
                "stealth.detectionAngleDeg",
                "must be within 0..=180",
            ));
        }
        if self.patrol_speed < 0.0 || self.chase_speed < 0.0 || self.catch_distance < 0.0 {
            return Err(ConfigError::invalid(
                "stealth.speeds",
                "speeds and catch distance must not be negative",
            ));
        }
        if self.suspicion_timeout <= 0.0 || self.search_timeout <= 0.0 {
            return Err(ConfigError::invalid(
                "stealth.timeouts",
                "must be positive",
            ));
        }
        Ok(())
    }
}

impl BossConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_health <= 0.0 {
            return Err(ConfigError::invalid("boss.maxHealth", "must be positive"));
        }
        if self.obstacle_spawn_interval <= 0.0 {
            return Err(ConfigError::invalid(
                "boss.obstacleSpawnInterval",
                "must be positive",
            ));
        }
        if !(0.0..=1.0).contains(&self.orb_damage_fraction) {
            return Err(ConfigError::invalid(
                "boss.orbDamageFraction",
                "must be within 0..=1",
            ));
        }
        if self.orbs_to_advance == 0 {
            return Err(ConfigError::invalid("boss.orbsToAdvance", "must be positive"));
        }
        if self.barrel_repetitions > MAX_BARREL_REPETITIONS {
            return Err(ConfigError::invalid(
                "boss.barrelRepetitions",
                format!("must not exceed {MAX_BARREL_REPETITIONS}"),
            ));
        }
        if self.phase1_duration < 0.0 || self.defeat_fade_duration < 0.0 {
            return Err(ConfigError::invalid(
                "boss.durations",
                "must not be negative",
            ));
        }
        Ok(())
    }
}
