use crate::server_protocol::Encounter;
use crate::types::Vec2;

/// Largest distance a single `move` message may carry the player.
pub const MAX_MOVE_STEP: f32 = 1.0;

pub fn default_stage_name(encounter: Encounter) -> &'static str {
    match encounter {
        Encounter::Rhythm => "dheki",
        Encounter::Stealth => "descent",
        Encounter::Boss => "confrontation",
    }
}

pub fn normalize_stage_name(raw: Option<&str>, encounter: Encounter) -> String {
    match raw.map(|value| value.trim().to_ascii_lowercase()) {
        Some(value) if !value.is_empty() => value,
        _ => default_stage_name(encounter).to_string(),
    }
}

pub fn clamp_move_delta(dx: f32, dy: f32) -> Vec2 {
    let delta = Vec2::new(dx, dy);
    if delta.length() <= MAX_MOVE_STEP {
        return delta;
    }
    delta.normalized() * MAX_MOVE_STEP
}

pub fn normalize_damage(amount: f32, max_health: f32) -> f32 {
    amount.clamp(0.0, max_health)
}

pub fn normalize_seed(value: Option<i64>) -> Option<u32> {
    value.map(|seed| (seed.rem_euclid(1 << 32)) as u32)
}
