use serde::Deserialize;

use crate::config::StealthConfig;
use crate::types::Vec2;

/// Line-of-sight blocker lookup.
pub trait Occlusion {
    /// True when something blocks the ray within `max_distance`.
    /// `direction` is expected to be normalised.
    fn raycast(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> bool;
}

/// Open field: nothing ever blocks sight.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOcclusion;

impl Occlusion for NoOcclusion {
    fn raycast(&self, _origin: Vec2, _direction: Vec2, _max_distance: f32) -> bool {
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_center(center: Vec2, half_width: f32, half_height: f32) -> Self {
        Self {
            min: Vec2::new(center.x - half_width, center.y - half_height),
            max: Vec2::new(center.x + half_width, center.y + half_height),
        }
    }

    fn ray_hits(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> bool {
        let mut t_enter = 0.0f32;
        let mut t_exit = max_distance;
        let axes = [
            (origin.x, direction.x, self.min.x, self.max.x),
            (origin.y, direction.y, self.min.y, self.max.y),
        ];
        for (start, dir, lo, hi) in axes {
            if dir.abs() <= f32::EPSILON {
                if start < lo || start > hi {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / dir;
            let mut t1 = (lo - start) * inv;
            let mut t2 = (hi - start) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_enter = t_enter.max(t1);
            t_exit = t_exit.min(t2);
            if t_enter > t_exit {
                return false;
            }
        }
        true
    }
}

/// Static axis-aligned blockers (walls, ledges, furniture).
#[derive(Clone, Debug, Default)]
pub struct Occluders {
    boxes: Vec<Aabb>,
}

impl Occluders {
    pub fn new(boxes: Vec<Aabb>) -> Self {
        Self { boxes }
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn boxes(&self) -> &[Aabb] {
        &self.boxes
    }
}

impl Occlusion for Occluders {
    fn raycast(&self, origin: Vec2, direction: Vec2, max_distance: f32) -> bool {
        self.boxes
            .iter()
            .any(|aabb| aabb.ray_hits(origin, direction, max_distance))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionSensor {
    pub radius: f32,
    pub half_angle_deg: f32,
}

impl DetectionSensor {
    pub fn from_config(config: &StealthConfig) -> Self {
        Self {
            radius: config.detection_radius,
            half_angle_deg: config.detection_angle_deg,
        }
    }

    /// Range, visibility, cone and line of sight must all pass.
    pub fn sense(
        &self,
        agent_pos: Vec2,
        agent_facing: Vec2,
        target_pos: Vec2,
        target_hidden: bool,
        occlusion: &dyn Occlusion,
    ) -> bool {
        let distance = agent_pos.distance(target_pos);
        if distance > self.radius || target_hidden {
            return false;
        }
        let to_target = (target_pos - agent_pos).normalized();
        if agent_facing.angle_deg(to_target) > self.half_angle_deg {
            return false;
        }
        if distance > 0.0 && occlusion.raycast(agent_pos, to_target, distance) {
            return false;
        }
        true
    }
}
