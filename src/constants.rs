pub const TICK_RATE: u32 = 60;
pub const TICK_SECONDS: f32 = 1.0 / TICK_RATE as f32;

// Rhythm
pub const DEFAULT_TOTAL_BEATS: usize = 30;
pub const MAX_TOTAL_BEATS: usize = 10_000;
pub const BASE_BPM: f32 = 90.0;
pub const MAX_BPM: f32 = 150.0;
pub const BPM_INCREASE_PER_BEAT: f32 = 0.5;
pub const BASE_HIT_WINDOW: f32 = 0.25;
pub const MIN_HIT_WINDOW: f32 = 0.1;
pub const PERFECT_WINDOW_RATIO: f32 = 0.3;
pub const EXHAUSTION_START: f32 = 100.0;
pub const EXHAUSTION_HIT_COST: f32 = 1.0;
pub const EXHAUSTION_MISS_COST: f32 = 0.0;
pub const EXHAUSTION_CRITICAL_RATIO: f32 = 0.3;
pub const VISION_BEAT_THRESHOLD: usize = 10;
pub const SEQUENCE_LEAD_IN_SECONDS: f64 = 0.5;
pub const BEAT_APPROACH_LEAD_SECONDS: f64 = 1.0;

// Stealth
pub const MAX_CATCHES: u32 = 5;
pub const DETECTION_RADIUS: f32 = 4.0;
pub const DETECTION_ANGLE_DEG: f32 = 60.0;
pub const PATROL_SPEED: f32 = 2.0;
pub const CHASE_SPEED: f32 = 3.5;
pub const CATCH_DISTANCE: f32 = 1.0;
pub const WAIT_AT_WAYPOINT_SECONDS: f32 = 2.0;
pub const WAYPOINT_REACHED_DISTANCE: f32 = 0.3;
pub const ALERT_RANGE_RATIO: f32 = 0.7;
pub const SUSPICION_TIMEOUT_SECONDS: f32 = 3.0;
pub const SEARCH_TIMEOUT_SECONDS: f32 = 5.0;
pub const SEARCH_ARRIVAL_DISTANCE: f32 = 0.5;
pub const SUSPICIOUS_SPEED_FACTOR: f32 = 0.5;
pub const SEARCHING_SPEED_FACTOR: f32 = 0.7;
pub const HIDING_SPOT_REACH: f32 = 1.5;
pub const CATCH_RECOVERY_SECONDS: f32 = 2.0;

// Boss
pub const BOSS_MAX_HEALTH: f32 = 100.0;
pub const PHASE1_DURATION_SECONDS: f32 = 30.0;
pub const PHASE1_MOVE_SPEED: f32 = 3.0;
pub const PHASE2_MOVE_SPEED: f32 = 4.0;
pub const PHASE3_SPEED_FACTOR: f32 = 0.5;
pub const SLOWED_SPEED_FACTOR: f32 = 0.5;
pub const OBSTACLE_SPAWN_INTERVAL_SECONDS: f32 = 2.0;
pub const OBSTACLE_LIFETIME_SECONDS: f32 = 5.0;
pub const ORB_DAMAGE_FRACTION: f32 = 0.15;
pub const ORB_SLOW_DURATION_SECONDS: f32 = 3.0;
pub const ORBS_TO_ADVANCE: u32 = 3;
pub const ORB_PROJECTILE_SPEED: f32 = 10.0;
pub const ORB_PROJECTILE_LIFETIME_SECONDS: f32 = 5.0;
pub const ORB_HIT_RADIUS: f32 = 0.5;
pub const BARREL_REPETITIONS: u32 = 3;
pub const MAX_BARREL_REPETITIONS: u32 = 100;
pub const BARREL_SPEED: f32 = 6.0;
pub const BARREL_LIFETIME_SECONDS: f32 = 8.0;
pub const BARREL_SPIN_FACTOR: f32 = 50.0;
pub const BARREL_HIT_RADIUS: f32 = 0.5;
pub const BARREL_INTRO_DELAY_SECONDS: f32 = 1.0;
pub const BARREL_TO_VINES_DELAY_SECONDS: f32 = 4.0;
pub const VINES_TO_BARREL_DELAY_SECONDS: f32 = 2.0;
pub const VINES_PER_CLUSTER: u32 = 3;
pub const VINE_BASE_OFFSET: f32 = 5.0;
pub const VINE_SPACING: f32 = 3.0;
pub const VINE_JITTER: f32 = 3.0;
pub const VINE_LIFETIME_SECONDS: f32 = 8.0;
pub const DEFEAT_FADE_SECONDS: f32 = 3.0;

/// Hit window for a beat index, narrowing linearly from `base` to `min`.
pub fn hit_window_for_progress(base: f32, min: f32, beat_index: usize, total_beats: usize) -> f32 {
    if total_beats == 0 {
        return base;
    }
    let progress = (beat_index as f32 / total_beats as f32).clamp(0.0, 1.0);
    base + (min - base) * progress
}

pub fn tempo_for_beat(start: f32, max: f32, increase: f32, beat_index: usize) -> f32 {
    (start + beat_index as f32 * increase).min(max)
}

pub fn difficulty_tier_for_beat(beat_index: usize) -> u8 {
    if beat_index < 3 {
        return 1;
    }
    if beat_index < 6 {
        return 2;
    }
    if beat_index < 9 {
        return 3;
    }
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_window_narrows_to_minimum_at_end() {
        assert_eq!(hit_window_for_progress(0.25, 0.1, 0, 30), 0.25);
        assert!((hit_window_for_progress(0.25, 0.1, 15, 30) - 0.175).abs() < 1e-6);
        assert!((hit_window_for_progress(0.25, 0.1, 30, 30) - 0.1).abs() < 1e-6);
        assert!((hit_window_for_progress(0.25, 0.1, 45, 30) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn tempo_is_capped_at_max() {
        assert_eq!(tempo_for_beat(90.0, 150.0, 0.5, 0), 90.0);
        assert_eq!(tempo_for_beat(90.0, 150.0, 0.5, 10), 95.0);
        assert_eq!(tempo_for_beat(90.0, 150.0, 0.5, 500), 150.0);
    }

    #[test]
    fn tiers_follow_index_bands() {
        let tiers: Vec<u8> = (0..12).map(difficulty_tier_for_beat).collect();
        assert_eq!(tiers, vec![1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4]);
    }
}
