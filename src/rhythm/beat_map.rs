use serde::{Deserialize, Serialize};

use crate::config::RhythmConfig;
use crate::constants::{difficulty_tier_for_beat, tempo_for_beat};
use crate::error::ConfigError;
use crate::rng::RandomSource;
use crate::types::{BeatEvent, InputKey};

#[derive(Clone, Copy, Debug)]
pub struct BeatMapParams {
    pub total_beats: usize,
    pub start_tempo: f32,
    pub max_tempo: f32,
    pub tempo_increase_per_beat: f32,
    pub vision_threshold: usize,
}

impl From<&RhythmConfig> for BeatMapParams {
    fn from(config: &RhythmConfig) -> Self {
        Self {
            total_beats: config.total_beats,
            start_tempo: config.start_bpm,
            max_tempo: config.max_bpm,
            tempo_increase_per_beat: config.bpm_increase_per_beat,
            vision_threshold: config.vision_beat_threshold,
        }
    }
}

/// Ordered beats plus the tempo they were authored against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatMap {
    pub name: String,
    #[serde(rename = "baseTempo")]
    pub base_tempo: f32,
    pub beats: Vec<BeatEvent>,
}

impl BeatMap {
    pub fn generated(params: &BeatMapParams, rng: &mut impl RandomSource) -> Self {
        Self {
            name: "generated".to_string(),
            base_tempo: params.start_tempo,
            beats: generate_beat_map(params, rng),
        }
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.beats.is_empty() {
            return Err(ConfigError::EmptyBeatMap);
        }
        for (index, pair) in self.beats.windows(2).enumerate() {
            if pair[1].scheduled_time <= pair[0].scheduled_time {
                return Err(ConfigError::UnorderedBeatMap { index: index + 1 });
            }
        }
        Ok(())
    }
}

/// Builds the default pounding pattern.
///
/// The first nine beats alternate keys in three bands (L/R, R/L, L/R); from
/// beat 9 onward the key is drawn from `rng`, which is consulted for nothing
/// else. Each beat freezes its own tempo and is spaced `60 / tempo` seconds
/// after the previous one, so later changes to the live tempo cannot move it.
pub fn generate_beat_map(params: &BeatMapParams, rng: &mut impl RandomSource) -> Vec<BeatEvent> {
    let mut beats = Vec::with_capacity(params.total_beats);
    let mut scheduled_time = 0.0f64;

    for index in 0..params.total_beats {
        let snapshot_tempo = tempo_for_beat(
            params.start_tempo,
            params.max_tempo,
            params.tempo_increase_per_beat,
            index,
        );
        if index > 0 {
            scheduled_time += 60.0 / f64::from(snapshot_tempo);
        }

        let difficulty_tier = difficulty_tier_for_beat(index);
        let even = index % 2 == 0;
        let required_input = match difficulty_tier {
            1 | 3 => {
                if even {
                    InputKey::Left
                } else {
                    InputKey::Right
                }
            }
            2 => {
                if even {
                    InputKey::Right
                } else {
                    InputKey::Left
                }
            }
            _ => {
                if rng.next_f32() > 0.5 {
                    InputKey::Left
                } else {
                    InputKey::Right
                }
            }
        };

        let triggers_vision =
            params.vision_threshold > 0 && index > 0 && index % params.vision_threshold == 0;

        beats.push(BeatEvent {
            index,
            scheduled_time,
            required_input,
            difficulty_tier,
            triggers_vision,
            snapshot_tempo,
        });
    }
    beats
}
