use crate::config::BossConfig;
use crate::constants::{
    BARREL_INTRO_DELAY_SECONDS, BARREL_TO_VINES_DELAY_SECONDS, MAX_BARREL_REPETITIONS,
    VINES_TO_BARREL_DELAY_SECONDS,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptAction {
    LaunchBarrel,
    SpawnVines,
    Finish,
}

/// Timed action list for the barrel pursuit. Each step waits its delay and
/// then fires; leftover time carries into the next step, so a long tick can
/// fire several actions in order.
#[derive(Clone, Debug)]
pub struct BarrelScript {
    steps: Vec<(f32, ScriptAction)>,
    cursor: usize,
    timer: f32,
}

impl BarrelScript {
    pub fn new(repetitions: u32, intro: f32, barrel_to_vines: f32, vines_to_barrel: f32) -> Self {
        let mut steps = Vec::with_capacity(repetitions as usize * 2 + 1);
        let mut wait = intro;
        for _ in 0..repetitions {
            steps.push((wait, ScriptAction::LaunchBarrel));
            steps.push((barrel_to_vines, ScriptAction::SpawnVines));
            wait = vines_to_barrel;
        }
        steps.push((wait, ScriptAction::Finish));
        Self {
            steps,
            cursor: 0,
            timer: 0.0,
        }
    }

    pub fn from_config(config: &BossConfig) -> Self {
        Self::new(
            config.barrel_repetitions.min(MAX_BARREL_REPETITIONS),
            BARREL_INTRO_DELAY_SECONDS,
            BARREL_TO_VINES_DELAY_SECONDS,
            VINES_TO_BARREL_DELAY_SECONDS,
        )
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.steps.len()
    }

    pub fn tick(&mut self, dt: f32) -> Vec<ScriptAction> {
        let mut fired = Vec::new();
        if self.is_finished() {
            return fired;
        }
        self.timer += dt;
        while let Some(&(delay, action)) = self.steps.get(self.cursor) {
            if self.timer < delay {
                break;
            }
            self.timer -= delay;
            self.cursor += 1;
            fired.push(action);
        }
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_script_alternates_then_finishes() {
        let mut script = BarrelScript::from_config(&BossConfig::default());
        let mut timeline = Vec::new();
        let mut elapsed = 0.0f32;
        while !script.is_finished() {
            elapsed += 0.5;
            for action in script.tick(0.5) {
                timeline.push((elapsed, action));
            }
        }
        use ScriptAction::*;
        assert_eq!(
            timeline,
            vec![
                (1.0, LaunchBarrel),
                (5.0, SpawnVines),
                (7.0, LaunchBarrel),
                (11.0, SpawnVines),
                (13.0, LaunchBarrel),
                (17.0, SpawnVines),
                (19.0, Finish),
            ]
        );
        assert!(script.tick(10.0).is_empty());
    }

    #[test]
    fn unvalidated_repetitions_are_clamped() {
        let config = BossConfig {
            barrel_repetitions: u32::MAX,
            ..BossConfig::default()
        };
        let script = BarrelScript::from_config(&config);
        assert_eq!(script.steps.len(), MAX_BARREL_REPETITIONS as usize * 2 + 1);
        assert_eq!(script.steps.last().map(|step| step.1), Some(ScriptAction::Finish));
    }

    #[test]
    fn long_tick_fires_in_order() {
        let mut script = BarrelScript::new(1, 1.0, 4.0, 2.0);
        assert_eq!(
            script.tick(5.5),
            vec![ScriptAction::LaunchBarrel, ScriptAction::SpawnVines]
        );
        assert_eq!(script.tick(1.5), vec![ScriptAction::Finish]);
    }

    #[test]
    fn zero_repetitions_finishes_after_intro() {
        let mut script = BarrelScript::new(0, 1.0, 4.0, 2.0);
        assert!(script.tick(0.5).is_empty());
        assert_eq!(script.tick(0.5), vec![ScriptAction::Finish]);
    }
}
