use crate::error::ConfigError;
use crate::stealth::{Aabb, HidingSpot};
use crate::types::Vec2;

#[derive(Clone, Debug)]
pub struct AgentSpawn {
    pub id: String,
    pub spawn: Vec2,
    pub waypoints: Vec<Vec2>,
}

/// Layout for a stealth encounter.
#[derive(Clone, Debug)]
pub struct StealthStage {
    pub name: String,
    pub player_spawn: Vec2,
    pub agents: Vec<AgentSpawn>,
    pub hiding_spots: Vec<HidingSpot>,
    pub occluders: Vec<Aabb>,
}

impl StealthStage {
    /// Strict check. Runtime tolerates these problems, so callers usually
    /// only log the result.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(agent) = self.agents.iter().find(|agent| agent.waypoints.is_empty()) {
            return Err(ConfigError::NoPatrolPoints {
                agent_id: agent.id.clone(),
            });
        }
        Ok(())
    }
}

/// Layout for the boss encounter.
#[derive(Clone, Debug)]
pub struct BossArena {
    pub name: String,
    pub player_spawn: Vec2,
    pub boss_spawn: Vec2,
    pub obstacle_spawn_points: Vec<Vec2>,
    pub barrel_spawn: Vec2,
}

impl BossArena {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.obstacle_spawn_points.is_empty() {
            return Err(ConfigError::NoSpawnPoints);
        }
        Ok(())
    }
}

/// Storage rooms under the house: one guard walking the full floor.
pub fn descent_stage() -> StealthStage {
    let floor_y = -1.5;
    StealthStage {
        name: "descent".to_string(),
        player_spawn: Vec2::new(-11.0, floor_y),
        agents: vec![AgentSpawn {
            id: "ranima".to_string(),
            spawn: Vec2::new(4.0, floor_y),
            waypoints: vec![
                Vec2::new(-8.0, floor_y),
                Vec2::new(-5.0, floor_y),
                Vec2::new(5.0, floor_y),
                Vec2::new(8.0, floor_y),
            ],
        }],
        hiding_spots: vec![
            HidingSpot::new("cabinet", Vec2::new(-3.0, -1.8)),
            HidingSpot::new("curtain", Vec2::new(0.0, -1.8)),
            HidingSpot::new("barrel", Vec2::new(5.0, -1.8)),
            HidingSpot::new("shadow", Vec2::new(-7.0, -1.8)),
        ],
        occluders: vec![Aabb::from_center(Vec2::new(3.0, -0.5), 1.5, 0.2)],
    }
}

pub fn confrontation_arena() -> BossArena {
    BossArena {
        name: "confrontation".to_string(),
        player_spawn: Vec2::new(-6.0, -2.0),
        boss_spawn: Vec2::ZERO,
        obstacle_spawn_points: vec![
            Vec2::new(-7.0, 0.0),
            Vec2::new(7.0, 0.0),
            Vec2::new(0.0, 4.0),
        ],
        barrel_spawn: Vec2::new(8.0, 0.0),
    }
}

pub fn stealth_stage_by_name(name: &str) -> Option<StealthStage> {
    match name {
        "descent" => Some(descent_stage()),
        _ => None,
    }
}

pub fn boss_arena_by_name(name: &str) -> Option<BossArena> {
    match name {
        "confrontation" => Some(confrontation_arena()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_layouts_validate() {
        descent_stage().validate().expect("descent stage is complete");
        confrontation_arena()
            .validate()
            .expect("confrontation arena is complete");
    }

    #[test]
    fn descent_route_spans_the_floor() {
        let stage = descent_stage();
        let xs: Vec<f32> = stage.agents[0].waypoints.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![-8.0, -5.0, 5.0, 8.0]);
        assert_eq!(stage.hiding_spots.len(), 4);
    }

    #[test]
    fn missing_route_or_spawns_are_reported() {
        let mut stage = descent_stage();
        stage.agents[0].waypoints.clear();
        assert!(matches!(
            stage.validate(),
            Err(ConfigError::NoPatrolPoints { agent_id }) if agent_id == "ranima"
        ));

        let mut arena = confrontation_arena();
        arena.obstacle_spawn_points.clear();
        assert!(matches!(arena.validate(), Err(ConfigError::NoSpawnPoints)));
    }

    #[test]
    fn lookup_by_name() {
        assert!(stealth_stage_by_name("descent").is_some());
        assert!(boss_arena_by_name("confrontation").is_some());
        assert!(stealth_stage_by_name("attic").is_none());
    }
}
