use tracing::debug;

use crate::config::StealthConfig;
use crate::constants::{
    SEARCHING_SPEED_FACTOR, SEARCH_ARRIVAL_DISTANCE, SUSPICIOUS_SPEED_FACTOR,
    WAYPOINT_REACHED_DISTANCE,
};
use crate::types::{AgentView, DetectionState, Vec2};

use super::sensor::{DetectionSensor, Occlusion};
use super::target::StealthTarget;

/// What happened to one agent during a tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AgentStep {
    pub transition: Option<(DetectionState, DetectionState)>,
    pub caught: bool,
}

/// Patrolling guard with a four-state detection automaton.
#[derive(Clone, Debug)]
pub struct EnemyAgent {
    id: String,
    position: Vec2,
    facing: Vec2,
    home: Vec2,
    waypoints: Vec<Vec2>,
    patrol_index: usize,
    wait_timer: f32,
    state: DetectionState,
    state_timer: f32,
    last_known: Vec2,
    sensor: DetectionSensor,
}

impl EnemyAgent {
    pub fn new(id: &str, spawn: Vec2, waypoints: Vec<Vec2>, sensor: DetectionSensor) -> Self {
        let home = waypoints.first().copied().unwrap_or(spawn);
        let facing = waypoints
            .first()
            .map(|point| (*point - spawn).normalized())
            .filter(|dir| *dir != Vec2::ZERO)
            .unwrap_or(Vec2::RIGHT);
        Self {
            id: id.to_string(),
            position: spawn,
            facing,
            home,
            waypoints,
            patrol_index: 0,
            wait_timer: 0.0,
            state: DetectionState::Unaware,
            state_timer: 0.0,
            last_known: spawn,
            sensor,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn facing(&self) -> Vec2 {
        self.facing
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn last_known_position(&self) -> Vec2 {
        self.last_known
    }

    pub fn has_route(&self) -> bool {
        !self.waypoints.is_empty()
    }

    pub fn tick(
        &mut self,
        dt: f32,
        config: &StealthConfig,
        target: &dyn StealthTarget,
        occlusion: &dyn Occlusion,
    ) -> AgentStep {
        let mut step = AgentStep::default();
        let target_pos = target.position();
        let alert_range = self.sensor.radius * config.alert_range_ratio;

        match self.state {
            DetectionState::Unaware => {
                self.patrol(dt, config);
                if self.sees(target, occlusion) {
                    self.last_known = target_pos;
                    step.transition = self.set_state(DetectionState::Suspicious);
                }
            }
            DetectionState::Suspicious => {
                self.state_timer += dt;
                self.move_to(self.last_known, config.patrol_speed * SUSPICIOUS_SPEED_FACTOR, dt);
                if self.sees(target, occlusion) {
                    self.last_known = target_pos;
                    if self.position.distance(target_pos) < alert_range {
                        step.transition = self.set_state(DetectionState::Alerted);
                        return step;
                    }
                }
                if self.state_timer >= config.suspicion_timeout {
                    step.transition = self.set_state(DetectionState::Unaware);
                }
            }
            DetectionState::Alerted => {
                if target.is_hidden() {
                    self.last_known = target_pos;
                    step.transition = self.set_state(DetectionState::Searching);
                    return step;
                }
                self.move_to(target_pos, config.chase_speed, dt);
                self.last_known = target_pos;
                if self.position.distance(target_pos) < config.catch_distance {
                    step.caught = true;
                    step.transition = self.reset_after_catch();
                }
            }
            DetectionState::Searching => {
                self.state_timer += dt;
                self.move_to(self.last_known, config.patrol_speed * SEARCHING_SPEED_FACTOR, dt);
                if self.sees(target, occlusion) {
                    self.last_known = target_pos;
                    let next = if self.position.distance(target_pos) < alert_range {
                        DetectionState::Alerted
                    } else {
                        DetectionState::Suspicious
                    };
                    step.transition = self.set_state(next);
                    return step;
                }
                if self.state_timer >= config.search_timeout
                    || self.position.distance(self.last_known) < SEARCH_ARRIVAL_DISTANCE
                {
                    step.transition = self.set_state(DetectionState::Unaware);
                }
            }
        }
        step
    }

    pub fn view(&self) -> AgentView {
        AgentView {
            id: self.id.clone(),
            x: self.position.x,
            y: self.position.y,
            facing_x: self.facing.x,
            facing_y: self.facing.y,
            state: self.state,
            last_known_x: self.last_known.x,
            last_known_y: self.last_known.y,
        }
    }

    fn sees(&self, target: &dyn StealthTarget, occlusion: &dyn Occlusion) -> bool {
        self.sensor.sense(
            self.position,
            self.facing,
            target.position(),
            target.is_hidden(),
            occlusion,
        )
    }

    fn set_state(&mut self, next: DetectionState) -> Option<(DetectionState, DetectionState)> {
        let previous = self.state;
        self.state = next;
        self.state_timer = 0.0;
        if previous == next {
            return None;
        }
        if next == DetectionState::Unaware {
            self.wait_timer = 0.0;
        }
        debug!(agent = %self.id, from = ?previous, to = ?next, "agent state changed");
        Some((previous, next))
    }

    fn reset_after_catch(&mut self) -> Option<(DetectionState, DetectionState)> {
        self.position = self.home;
        self.patrol_index = 0;
        self.last_known = self.home;
        self.set_state(DetectionState::Unaware)
    }

    fn move_to(&mut self, target: Vec2, speed: f32, dt: f32) {
        let direction = (target - self.position).normalized();
        if direction != Vec2::ZERO {
            self.facing = direction;
        }
        self.position = self.position.move_towards(target, speed * dt);
    }

    fn patrol(&mut self, dt: f32, config: &StealthConfig) {
        if self.waypoints.is_empty() {
            return;
        }
        if self.wait_timer > 0.0 {
            self.wait_timer -= dt;
            if self.wait_timer <= 0.0 {
                self.wait_timer = 0.0;
                self.patrol_index = (self.patrol_index + 1) % self.waypoints.len();
            }
            return;
        }

        let waypoint = self.waypoints[self.patrol_index];
        self.move_to(waypoint, config.patrol_speed, dt);
        if self.position.distance(waypoint) < WAYPOINT_REACHED_DISTANCE {
            if config.wait_at_waypoint > 0.0 {
                self.wait_timer = config.wait_at_waypoint;
            } else {
                self.patrol_index = (self.patrol_index + 1) % self.waypoints.len();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stealth::sensor::{Aabb, NoOcclusion, Occluders};
    use crate::stealth::target::{HidingSpot, PlayerAvatar};

    fn agent_at(position: Vec2, waypoints: Vec<Vec2>) -> EnemyAgent {
        let config = StealthConfig::default();
        EnemyAgent::new("ranima", position, waypoints, DetectionSensor::from_config(&config))
    }

    #[test]
    fn occluded_target_leaves_agent_unaware() {
        let config = StealthConfig::default();
        let mut agent = agent_at(Vec2::ZERO, Vec::new());
        let player = PlayerAvatar::new(Vec2::new(3.0, 0.0));
        let wall = Occluders::new(vec![Aabb::from_center(Vec2::new(1.5, 0.0), 0.2, 1.0)]);

        for _ in 0..30 {
            let step = agent.tick(1.0 / 60.0, &config, &player, &wall);
            assert_eq!(step, AgentStep::default());
        }
        assert_eq!(agent.state(), DetectionState::Unaware);
    }

    #[test]
    fn visible_target_makes_agent_suspicious_then_alerted() {
        let config = StealthConfig::default();
        let mut agent = agent_at(Vec2::ZERO, Vec::new());
        let player = PlayerAvatar::new(Vec2::new(3.5, 0.0));

        let step = agent.tick(0.1, &config, &player, &NoOcclusion);
        assert_eq!(
            step.transition,
            Some((DetectionState::Unaware, DetectionState::Suspicious))
        );
        assert_eq!(agent.last_known_position(), Vec2::new(3.5, 0.0));

        let mut alerted = false;
        for _ in 0..20 {
            let step = agent.tick(0.1, &config, &player, &NoOcclusion);
            if step.transition == Some((DetectionState::Suspicious, DetectionState::Alerted)) {
                alerted = true;
                break;
            }
        }
        assert!(alerted);
        assert!(agent.position().distance(player.position()) < 4.0 * 0.7);
    }

    #[test]
    fn suspicion_fades_when_target_leaves_sight() {
        let config = StealthConfig::default();
        let mut agent = agent_at(Vec2::ZERO, Vec::new());
        let mut player = PlayerAvatar::new(Vec2::new(3.9, 0.0));
        agent.tick(0.25, &config, &player, &NoOcclusion);
        assert_eq!(agent.state(), DetectionState::Suspicious);

        player.teleport(Vec2::new(-10.0, 0.0));
        for _ in 0..11 {
            agent.tick(0.25, &config, &player, &NoOcclusion);
            assert_eq!(agent.state(), DetectionState::Suspicious);
        }
        agent.tick(0.25, &config, &player, &NoOcclusion);
        assert_eq!(agent.state(), DetectionState::Unaware);
    }

    #[test]
    fn search_times_out_exactly_at_limit() {
        let config = StealthConfig {
            patrol_speed: 0.0,
            ..StealthConfig::default()
        };
        let mut agent = agent_at(Vec2::ZERO, Vec::new());
        let spot = HidingSpot::new("pot", Vec2::new(0.8, 0.0));
        let mut player = PlayerAvatar::new(Vec2::new(0.8, 0.0));

        player.hide(0, &spot);
        player.teleport(Vec2::new(-30.0, 0.0));
        agent.last_known = Vec2::new(30.0, 0.0);
        agent.state = DetectionState::Searching;

        for _ in 0..19 {
            agent.tick(0.25, &config, &player, &NoOcclusion);
            assert_eq!(agent.state(), DetectionState::Searching);
        }
        let step = agent.tick(0.25, &config, &player, &NoOcclusion);
        assert_eq!(
            step.transition,
            Some((DetectionState::Searching, DetectionState::Unaware))
        );
    }

    fn searching_agent(last_known: Vec2) -> (StealthConfig, EnemyAgent) {
        let config = StealthConfig {
            patrol_speed: 0.0,
            ..StealthConfig::default()
        };
        let mut agent = agent_at(Vec2::ZERO, Vec::new());
        agent.last_known = last_known;
        agent.state = DetectionState::Searching;
        (config, agent)
    }

    #[test]
    fn search_redetect_inside_alert_range_resumes_chase() {
        let (config, mut agent) = searching_agent(Vec2::new(30.0, 0.0));
        let player = PlayerAvatar::new(Vec2::new(2.0, 0.0));

        let step = agent.tick(0.1, &config, &player, &NoOcclusion);
        assert_eq!(
            step.transition,
            Some((DetectionState::Searching, DetectionState::Alerted))
        );
        assert_eq!(agent.last_known_position(), Vec2::new(2.0, 0.0));
    }

    #[test]
    fn search_redetect_beyond_alert_range_is_only_suspicious() {
        let (config, mut agent) = searching_agent(Vec2::new(30.0, 0.0));
        let player = PlayerAvatar::new(Vec2::new(3.5, 0.0));

        let step = agent.tick(0.1, &config, &player, &NoOcclusion);
        assert_eq!(
            step.transition,
            Some((DetectionState::Searching, DetectionState::Suspicious))
        );
        assert_eq!(agent.last_known_position(), Vec2::new(3.5, 0.0));
    }

    #[test]
    fn search_ends_on_arrival_before_timeout() {
        let player = PlayerAvatar::new(Vec2::new(-30.0, 0.0));

        let (config, mut agent) = searching_agent(Vec2::new(0.6, 0.0));
        agent.tick(0.25, &config, &player, &NoOcclusion);
        assert_eq!(agent.state(), DetectionState::Searching);

        let (config, mut agent) = searching_agent(Vec2::new(0.4, 0.0));
        let step = agent.tick(0.25, &config, &player, &NoOcclusion);
        assert_eq!(
            step.transition,
            Some((DetectionState::Searching, DetectionState::Unaware))
        );
    }

    #[test]
    fn hiding_during_chase_switches_to_searching() {
        let config = StealthConfig::default();
        let mut agent = agent_at(Vec2::ZERO, Vec::new());
        let spot = HidingSpot::new("straw", Vec2::new(2.0, 0.0));
        let mut player = PlayerAvatar::new(Vec2::new(2.0, 0.0));
        agent.state = DetectionState::Alerted;

        player.hide(0, &spot);
        let step = agent.tick(0.1, &config, &player, &NoOcclusion);
        assert_eq!(
            step.transition,
            Some((DetectionState::Alerted, DetectionState::Searching))
        );
        assert!(!step.caught);
        assert_eq!(agent.last_known_position(), spot.position);
    }

    #[test]
    fn catch_resets_agent_to_home_waypoint() {
        let config = StealthConfig::default();
        let waypoints = vec![Vec2::new(-8.0, -1.5), Vec2::new(8.0, -1.5)];
        let mut agent = agent_at(Vec2::new(1.0, -1.5), waypoints);
        let player = PlayerAvatar::new(Vec2::new(2.5, -1.5));
        agent.state = DetectionState::Alerted;

        let mut caught = false;
        for _ in 0..60 {
            let step = agent.tick(0.1, &config, &player, &NoOcclusion);
            if step.caught {
                caught = true;
                assert_eq!(
                    step.transition,
                    Some((DetectionState::Alerted, DetectionState::Unaware))
                );
                break;
            }
        }
        assert!(caught);
        assert_eq!(agent.position(), Vec2::new(-8.0, -1.5));
        assert_eq!(agent.state(), DetectionState::Unaware);
    }

    #[test]
    fn patrol_waits_at_each_waypoint() {
        let config = StealthConfig::default();
        let waypoints = vec![Vec2::new(1.0, 0.0), Vec2::new(-1.0, 0.0)];
        let mut agent = agent_at(Vec2::ZERO, waypoints);
        let player = PlayerAvatar::new(Vec2::new(50.0, 50.0));

        agent.tick(0.5, &config, &player, &NoOcclusion);
        assert_eq!(agent.position(), Vec2::new(1.0, 0.0));
        for _ in 0..3 {
            agent.tick(0.5, &config, &player, &NoOcclusion);
            assert_eq!(agent.position(), Vec2::new(1.0, 0.0));
        }
        agent.tick(0.5, &config, &player, &NoOcclusion);
        agent.tick(0.5, &config, &player, &NoOcclusion);
        assert!(agent.position().x < 1.0);
        assert_eq!(agent.facing(), Vec2::LEFT);
    }
}
