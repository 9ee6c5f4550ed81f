//! Stealth encounter: guards patrol a stage, sense the player and chase.
//! Getting caught is counted, and enough catches end the sequence.

use tracing::{info, warn};

use crate::config::StealthConfig;
use crate::constants::{CATCH_RECOVERY_SECONDS, HIDING_SPOT_REACH};
use crate::types::{StealthEvent, StealthView, Vec2};
use crate::world::StealthStage;

mod agent;
mod sensor;
mod target;

pub use self::agent::{AgentStep, EnemyAgent};
pub use self::sensor::{Aabb, DetectionSensor, NoOcclusion, Occluders, Occlusion};
pub use self::target::{HidingSpot, PlayerAvatar, StealthTarget};

pub struct StealthManager {
    config: StealthConfig,
    agents: Vec<EnemyAgent>,
    hiding_spots: Vec<HidingSpot>,
    occluders: Occluders,
    catch_count: u32,
    active: bool,
    completed: bool,
    events: Vec<StealthEvent>,
}

impl StealthManager {
    pub fn new(config: StealthConfig) -> Self {
        Self {
            config,
            agents: Vec::new(),
            hiding_spots: Vec::new(),
            occluders: Occluders::default(),
            catch_count: 0,
            active: false,
            completed: false,
            events: Vec::new(),
        }
    }

    pub fn start(&mut self, stage: &StealthStage) {
        let sensor = DetectionSensor::from_config(&self.config);
        self.agents = stage
            .agents
            .iter()
            .map(|spawn| EnemyAgent::new(&spawn.id, spawn.spawn, spawn.waypoints.clone(), sensor))
            .collect();
        for agent in self.agents.iter().filter(|agent| !agent.has_route()) {
            warn!(agent = agent.id(), "agent has no patrol waypoints, it will stand still");
        }
        self.hiding_spots = stage.hiding_spots.clone();
        self.occluders = Occluders::new(stage.occluders.clone());
        self.catch_count = 0;
        self.completed = false;
        self.active = true;
        info!(stage = %stage.name, agents = self.agents.len(), "stealth sequence started");
    }

    pub fn stop(&mut self) {
        if self.active {
            self.active = false;
            info!(catches = self.catch_count, "stealth sequence stopped");
        }
    }

    /// Ticks every agent against `player`. Catches freeze the player briefly;
    /// a catch while hidden does not count.
    pub fn tick(&mut self, dt: f32, player: &mut PlayerAvatar) {
        if !self.active {
            return;
        }

        for agent in &mut self.agents {
            let step = agent.tick(dt, &self.config, &*player, &self.occluders);
            if let Some((from, to)) = step.transition {
                self.events.push(StealthEvent::StateChanged {
                    agent_id: agent.id().to_string(),
                    from,
                    to,
                });
            }
            if !step.caught || player.is_hidden() {
                continue;
            }

            self.catch_count += 1;
            player.freeze(CATCH_RECOVERY_SECONDS);
            self.events.push(StealthEvent::PlayerDetected {
                agent_id: agent.id().to_string(),
            });
            self.events.push(StealthEvent::CatchCountChanged {
                count: self.catch_count,
            });
            info!(agent = agent.id(), catches = self.catch_count, "player caught");

            if self.catch_count >= self.config.max_catches {
                self.completed = true;
                self.active = false;
                self.events.push(StealthEvent::StealthSequenceComplete);
                info!(catches = self.catch_count, "stealth sequence complete");
                break;
            }
        }
    }

    /// Index of the closest hiding spot within reach of `position`.
    pub fn hiding_spot_near(&self, position: Vec2) -> Option<usize> {
        self.hiding_spots
            .iter()
            .enumerate()
            .map(|(index, spot)| (index, spot.position.distance(position)))
            .filter(|(_, distance)| *distance <= HIDING_SPOT_REACH)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(index, _)| index)
    }

    pub fn hiding_spot(&self, index: usize) -> Option<&HidingSpot> {
        self.hiding_spots.get(index)
    }

    pub fn agents(&self) -> &[EnemyAgent] {
        &self.agents
    }

    pub fn catch_count(&self) -> u32 {
        self.catch_count
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn drain_events(&mut self) -> Vec<StealthEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn view(&self) -> StealthView {
        StealthView {
            active: self.active,
            catch_count: self.catch_count,
            max_catches: self.config.max_catches,
            agents: self.agents.iter().map(EnemyAgent::view).collect(),
        }
    }
}
