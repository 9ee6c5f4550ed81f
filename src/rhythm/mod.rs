//! Audio-clock driven rhythm judging.
//!
//! A session moves `Idle -> Running -> Completed | Failed`. Every beat's
//! deadline is `anchor + beat.scheduled_time`, where the anchor is fixed at
//! `start` and only ever shifted forward by time spent on hold (pending vision
//! or global pause). Live tempo and hit-window values are recomputed each tick
//! for feedback, but never feed back into a beat's deadline.

use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::TimingSource;
use crate::config::RhythmConfig;
use crate::constants::{hit_window_for_progress, tempo_for_beat, EXHAUSTION_CRITICAL_RATIO};
use crate::error::ConfigError;
use crate::types::{
    BeatEvent, BeatRating, InputKey, RhythmEvent, RhythmState, RhythmView, VisionChoice,
};

pub mod beat_map;
pub mod vision;

pub use self::beat_map::{generate_beat_map, BeatMap, BeatMapParams};
use self::vision::vision_choices;

pub struct RhythmEngine {
    config: RhythmConfig,
    clock: Arc<dyn TimingSource>,
    state: RhythmState,
    beats: Vec<BeatEvent>,
    anchor: f64,
    current_beat_index: usize,
    current_tempo: f32,
    current_hit_window: f32,
    exhaustion: f32,
    perfect_count: u32,
    good_count: u32,
    miss_count: u32,
    announced_index: Option<usize>,
    pending_vision: Option<Vec<VisionChoice>>,
    paused: bool,
    held_since: Option<f64>,
    critical_emitted: bool,
    chosen_flags: Vec<String>,
    events: Vec<RhythmEvent>,
}

impl RhythmEngine {
    pub fn new(config: RhythmConfig, clock: Arc<dyn TimingSource>) -> Self {
        Self {
            current_tempo: config.start_bpm,
            current_hit_window: config.base_hit_window,
            exhaustion: config.exhaustion_start,
            config,
            clock,
            state: RhythmState::Idle,
            beats: Vec::new(),
            anchor: 0.0,
            current_beat_index: 0,
            perfect_count: 0,
            good_count: 0,
            miss_count: 0,
            announced_index: None,
            pending_vision: None,
            paused: false,
            held_since: None,
            critical_emitted: false,
            chosen_flags: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn start(&mut self, beat_map: BeatMap) -> Result<(), ConfigError> {
        beat_map.validate()?;

        self.beats = beat_map.beats;
        self.state = RhythmState::Running;
        self.current_beat_index = 0;
        self.current_tempo = self.config.start_bpm;
        self.current_hit_window = self.config.base_hit_window;
        self.exhaustion = self.config.exhaustion_start;
        self.perfect_count = 0;
        self.good_count = 0;
        self.miss_count = 0;
        self.announced_index = None;
        self.pending_vision = None;
        self.held_since = None;
        self.critical_emitted = false;
        self.chosen_flags.clear();

        let now = self.clock.now();
        self.anchor = now + self.config.lead_in_seconds;
        if self.paused {
            self.held_since = Some(now);
        }
        info!(
            map = %beat_map.name,
            beats = self.beats.len(),
            anchor = self.anchor,
            "rhythm sequence started"
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state == RhythmState::Running {
            self.state = RhythmState::Stopped;
            self.pending_vision = None;
            info!(beat = self.current_beat_index, "rhythm sequence stopped");
        }
    }

    /// Advances the judge by one frame. `input` is the key pressed this
    /// frame, if any. Beats whose window closed before this frame are missed
    /// first, then `input` is judged against the beat that is now current.
    pub fn tick(&mut self, input: Option<InputKey>) {
        if self.state != RhythmState::Running || self.is_held() {
            return;
        }
        let now = self.clock.now();

        while let Some(beat) = self.beats.get(self.current_beat_index).cloned() {
            let offset = now - (self.anchor + beat.scheduled_time);
            if offset <= f64::from(self.current_hit_window) {
                break;
            }
            self.grade(&beat, BeatRating::Miss, offset, now);
            self.update_difficulty();
            if self.is_held() || self.exhaustion <= 0.0 {
                break;
            }
        }

        if !self.is_held() && self.exhaustion > 0.0 {
            if let Some(beat) = self.beats.get(self.current_beat_index).cloned() {
                let deadline = self.anchor + beat.scheduled_time;
                let time_until = deadline - now;
                if time_until > 0.0
                    && time_until <= self.config.approach_lead_seconds
                    && self.announced_index != Some(beat.index)
                {
                    self.announced_index = Some(beat.index);
                    self.events.push(RhythmEvent::BeatApproaching { beat: beat.clone() });
                }

                let offset = now - deadline;
                let window = f64::from(self.current_hit_window);
                if let Some(key) = input.filter(|_| offset.abs() <= window) {
                    let rating = if key != beat.required_input {
                        BeatRating::Miss
                    } else if offset.abs() <= window * f64::from(self.config.perfect_window_ratio)
                    {
                        BeatRating::Perfect
                    } else {
                        BeatRating::Good
                    };
                    self.grade(&beat, rating, offset, now);
                }
            }
        }

        self.update_difficulty();

        if self.exhaustion <= 0.0 {
            self.fail();
            return;
        }
        if self.current_beat_index >= self.beats.len() {
            self.complete();
        }
    }

    /// Applies the player's pick for the pending vision and resumes beat
    /// processing. Returns `false` when no vision is pending on a running
    /// session, in which case nothing changes.
    pub fn resolve_vision_choice(&mut self, choice_index: usize) -> bool {
        if self.state != RhythmState::Running {
            debug!(choice_index, "vision choice ignored: sequence not running");
            return false;
        }
        let Some(choices) = self.pending_vision.take() else {
            debug!(choice_index, "vision choice ignored: no vision pending");
            return false;
        };

        let flag = choices.get(choice_index).map(|choice| choice.flag.clone());
        if let Some(flag) = flag.as_ref() {
            self.chosen_flags.push(flag.clone());
        }
        self.events.push(RhythmEvent::VisionResolved { flag });
        let now = self.clock.now();
        self.release_hold(now);
        true
    }

    /// Coarse pause: the judge clock stands still until resumed.
    pub fn set_paused(&mut self, paused: bool) {
        if self.paused == paused {
            return;
        }
        self.paused = paused;
        let now = self.clock.now();
        if paused {
            self.held_since.get_or_insert(now);
        } else {
            self.release_hold(now);
        }
    }

    pub fn drain_events(&mut self) -> Vec<RhythmEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> RhythmState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == RhythmState::Running
    }

    pub fn beats(&self) -> &[BeatEvent] {
        &self.beats
    }

    pub fn current_beat_index(&self) -> usize {
        self.current_beat_index
    }

    pub fn current_tempo(&self) -> f32 {
        self.current_tempo
    }

    pub fn current_hit_window(&self) -> f32 {
        self.current_hit_window
    }

    pub fn exhaustion(&self) -> f32 {
        self.exhaustion
    }

    pub fn counts(&self) -> (u32, u32, u32) {
        (self.perfect_count, self.good_count, self.miss_count)
    }

    pub fn pending_vision(&self) -> Option<&[VisionChoice]> {
        self.pending_vision.as_deref()
    }

    pub fn chosen_flags(&self) -> &[String] {
        &self.chosen_flags
    }

    /// Absolute clock time at which the current beat should be struck.
    pub fn current_deadline(&self) -> Option<f64> {
        let beat = self.beats.get(self.current_beat_index)?;
        let held = self
            .held_since
            .map(|since| self.clock.now() - since)
            .unwrap_or(0.0);
        Some(self.anchor + held + beat.scheduled_time)
    }

    pub fn view(&self) -> RhythmView {
        RhythmView {
            state: self.state,
            current_beat_index: self.current_beat_index,
            total_beats: self.beats.len(),
            current_tempo: self.current_tempo,
            current_hit_window: self.current_hit_window,
            exhaustion: self.exhaustion,
            exhaustion_max: self.config.exhaustion_start,
            perfect_count: self.perfect_count,
            good_count: self.good_count,
            miss_count: self.miss_count,
            vision_pending: self.pending_vision.is_some(),
        }
    }

    fn is_held(&self) -> bool {
        self.pending_vision.is_some() || self.paused
    }

    fn release_hold(&mut self, now: f64) {
        if self.is_held() {
            return;
        }
        if let Some(since) = self.held_since.take() {
            self.anchor += (now - since).max(0.0);
        }
    }

    fn grade(&mut self, beat: &BeatEvent, rating: BeatRating, offset: f64, now: f64) {
        match rating {
            BeatRating::Perfect | BeatRating::Good => {
                if rating == BeatRating::Perfect {
                    self.perfect_count += 1;
                } else {
                    self.good_count += 1;
                }
                self.spend_exhaustion(self.config.exhaustion_hit_cost);
            }
            BeatRating::Miss => {
                self.miss_count += 1;
                self.spend_exhaustion(self.config.exhaustion_miss_cost);
            }
        }
        debug!(beat = beat.index, ?rating, offset, "beat graded");
        self.events.push(RhythmEvent::BeatResult {
            beat_index: beat.index,
            rating,
            offset,
        });

        self.current_beat_index += 1;

        if beat.triggers_vision {
            let vision_index = beat.index / self.config.vision_beat_threshold.max(1);
            let choices = vision_choices(vision_index);
            self.events.push(RhythmEvent::VisionTriggered {
                vision_index,
                choices: choices.clone(),
            });
            self.pending_vision = Some(choices);
            self.held_since.get_or_insert(now);
            debug!(beat = beat.index, vision_index, "vision triggered");
        }
    }

    fn spend_exhaustion(&mut self, cost: f32) {
        if cost <= 0.0 {
            return;
        }
        self.exhaustion = (self.exhaustion - cost).clamp(0.0, self.config.exhaustion_start);
        self.events.push(RhythmEvent::ExhaustionChanged {
            value: self.exhaustion,
        });
        if !self.critical_emitted
            && self.exhaustion < self.config.exhaustion_start * EXHAUSTION_CRITICAL_RATIO
        {
            self.critical_emitted = true;
            self.events.push(RhythmEvent::ExhaustionCritical {
                value: self.exhaustion,
            });
        }
    }

    fn update_difficulty(&mut self) {
        self.current_tempo = tempo_for_beat(
            self.config.start_bpm,
            self.config.max_bpm,
            self.config.bpm_increase_per_beat,
            self.current_beat_index,
        );
        self.current_hit_window = hit_window_for_progress(
            self.config.base_hit_window,
            self.config.min_hit_window,
            self.current_beat_index,
            self.beats.len(),
        );
    }

    fn fail(&mut self) {
        self.state = RhythmState::Failed;
        self.pending_vision = None;
        self.events.push(RhythmEvent::SequenceFailed {
            beat_index: self.current_beat_index,
        });
        info!(
            beat = self.current_beat_index,
            "rhythm sequence failed: exhaustion depleted"
        );
    }

    fn complete(&mut self) {
        self.state = RhythmState::Completed;
        self.pending_vision = None;
        self.events.push(RhythmEvent::SequenceCompleted {
            perfect: self.perfect_count,
            good: self.good_count,
            miss: self.miss_count,
        });
        info!(
            perfect = self.perfect_count,
            good = self.good_count,
            miss = self.miss_count,
            "rhythm sequence completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rng::Rng;

    fn make_engine(config: RhythmConfig) -> (RhythmEngine, ManualClock) {
        let clock = ManualClock::new(0.0);
        let engine = RhythmEngine::new(config, Arc::new(clock.clone()));
        (engine, clock)
    }

    fn make_map(config: &RhythmConfig, seed: u32) -> BeatMap {
        BeatMap::generated(&BeatMapParams::from(config), &mut Rng::new(seed))
    }

    fn strike_current_beat(engine: &mut RhythmEngine, clock: &ManualClock, offset: f64) {
        let deadline = engine.current_deadline().expect("beat remains");
        let key = engine.beats()[engine.current_beat_index()].required_input;
        clock.set(deadline + offset);
        engine.tick(Some(key));
    }

    #[test]
    fn perfect_run_through_thirty_beats_completes() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 11)).expect("start");
        let keys: Vec<InputKey> = engine.beats()[..3]
            .iter()
            .map(|beat| beat.required_input)
            .collect();
        assert_eq!(keys, vec![InputKey::Left, InputKey::Right, InputKey::Left]);

        while engine.state() == RhythmState::Running {
            strike_current_beat(&mut engine, &clock, 0.0);
            if engine.pending_vision().is_some() {
                assert!(engine.resolve_vision_choice(0));
            }
        }

        assert_eq!(engine.state(), RhythmState::Completed);
        assert_eq!(engine.counts(), (30, 0, 0));
        assert_eq!(engine.current_beat_index(), 30);
        assert_eq!(engine.exhaustion(), 70.0);
        assert_eq!(
            engine.chosen_flags(),
            &["triggers_memory_boat".to_string(), "triggers_memory_tree".to_string()]
        );
        let events = engine.drain_events();
        assert!(events.contains(&RhythmEvent::SequenceCompleted {
            perfect: 30,
            good: 0,
            miss: 0
        }));
    }

    #[test]
    fn exhaustion_tracks_hits_and_ignores_misses() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 2)).expect("start");

        for _ in 0..4 {
            strike_current_beat(&mut engine, &clock, 0.0);
        }
        assert_eq!(engine.exhaustion(), 96.0);
        let changes: Vec<f32> = engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                RhythmEvent::ExhaustionChanged { value } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(changes, vec![99.0, 98.0, 97.0, 96.0]);

        let deadline = engine.current_deadline().expect("beat remains");
        clock.set(deadline + f64::from(engine.current_hit_window()) + 0.01);
        engine.tick(None);
        assert_eq!(engine.counts(), (4, 0, 1));
        assert_eq!(engine.exhaustion(), 96.0);
        assert_eq!(engine.current_beat_index(), 5);
        assert!(!engine
            .drain_events()
            .iter()
            .any(|event| matches!(event, RhythmEvent::ExhaustionChanged { .. })));
    }

    #[test]
    fn press_after_a_long_frame_counts_for_the_current_beat() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 16)).expect("start");

        let second = engine.beats()[1].clone();
        let deadline = engine.current_deadline().expect("beat remains") + second.scheduled_time;
        clock.set(deadline);
        engine.tick(Some(second.required_input));

        assert_eq!(engine.counts(), (1, 0, 1));
        assert_eq!(engine.current_beat_index(), 2);
        let results: Vec<(usize, BeatRating)> = engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                RhythmEvent::BeatResult {
                    beat_index, rating, ..
                } => Some((beat_index, rating)),
                _ => None,
            })
            .collect();
        assert_eq!(
            results,
            vec![(0, BeatRating::Miss), (1, BeatRating::Perfect)]
        );
    }

    #[test]
    fn long_frame_misses_every_overdue_beat() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 17)).expect("start");

        let third = engine.beats()[3].scheduled_time;
        let anchor = engine.current_deadline().expect("beat remains");
        clock.set(anchor + third - 0.3);
        engine.tick(Some(InputKey::Left));

        assert_eq!(engine.counts(), (0, 0, 3));
        assert_eq!(engine.current_beat_index(), 3);
    }

    #[test]
    fn rating_depends_on_offset_within_window() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 3)).expect("start");

        strike_current_beat(&mut engine, &clock, 0.07);
        strike_current_beat(&mut engine, &clock, -0.2);
        assert_eq!(engine.counts(), (1, 1, 0));

        let deadline = engine.current_deadline().expect("beat remains");
        let wrong = engine.beats()[engine.current_beat_index()]
            .required_input
            .opposite();
        clock.set(deadline);
        engine.tick(Some(wrong));
        assert_eq!(engine.counts(), (1, 1, 1));
    }

    #[test]
    fn press_at_window_edge_is_a_hit_not_a_miss() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 4)).expect("start");

        strike_current_beat(&mut engine, &clock, f64::from(config.base_hit_window));
        assert_eq!(engine.counts(), (0, 1, 0));
        let results: Vec<_> = engine
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, RhythmEvent::BeatResult { .. }))
            .collect();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn early_press_outside_window_is_ignored() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 5)).expect("start");

        let deadline = engine.current_deadline().expect("beat remains");
        clock.set(deadline - 0.4);
        engine.tick(Some(InputKey::Left));
        assert_eq!(engine.counts(), (0, 0, 0));
        assert_eq!(engine.current_beat_index(), 0);
    }

    #[test]
    fn vision_suspends_processing_until_resolved() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 6)).expect("start");

        for _ in 0..11 {
            strike_current_beat(&mut engine, &clock, 0.0);
        }
        assert_eq!(engine.current_beat_index(), 11);
        assert!(engine.pending_vision().is_some());

        clock.advance(5.0);
        engine.tick(Some(InputKey::Left));
        engine.tick(None);
        assert_eq!(engine.current_beat_index(), 11);
        assert_eq!(engine.counts().2, 0);

        assert!(engine.resolve_vision_choice(1));
        assert_eq!(engine.chosen_flags(), &["triggers_memory_river".to_string()]);
        strike_current_beat(&mut engine, &clock, 0.0);
        assert_eq!(engine.counts(), (12, 0, 0));
    }

    #[test]
    fn missed_vision_beat_still_triggers_vision() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 7)).expect("start");

        for _ in 0..10 {
            strike_current_beat(&mut engine, &clock, 0.0);
        }
        engine.drain_events();
        let deadline = engine.current_deadline().expect("beat remains");
        clock.set(deadline + 1.0);
        engine.tick(None);

        let events = engine.drain_events();
        assert!(events.iter().any(|event| matches!(
            event,
            RhythmEvent::BeatResult {
                beat_index: 10,
                rating: BeatRating::Miss,
                ..
            }
        )));
        assert!(events
            .iter()
            .any(|event| matches!(event, RhythmEvent::VisionTriggered { vision_index: 1, .. })));
        assert!(engine.pending_vision().is_some());
    }

    #[test]
    fn out_of_range_choice_resumes_without_flag() {
        let config = RhythmConfig {
            vision_beat_threshold: 2,
            ..RhythmConfig::default()
        };
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 8)).expect("start");
        for _ in 0..3 {
            strike_current_beat(&mut engine, &clock, 0.0);
        }
        assert!(engine.resolve_vision_choice(9));
        assert!(engine.chosen_flags().is_empty());
        assert!(engine.pending_vision().is_none());
        assert!(!engine.resolve_vision_choice(0));
    }

    #[test]
    fn late_vision_choice_after_completion_is_ignored() {
        let config = RhythmConfig {
            total_beats: 11,
            ..RhythmConfig::default()
        };
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 9)).expect("start");
        while engine.state() == RhythmState::Running {
            strike_current_beat(&mut engine, &clock, 0.0);
        }
        assert_eq!(engine.state(), RhythmState::Completed);
        assert!(!engine.resolve_vision_choice(0));
        assert!(engine.chosen_flags().is_empty());
    }

    #[test]
    fn exhaustion_depletion_fails_before_completion() {
        let config = RhythmConfig {
            total_beats: 3,
            exhaustion_start: 3.0,
            ..RhythmConfig::default()
        };
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 10)).expect("start");
        for _ in 0..3 {
            strike_current_beat(&mut engine, &clock, 0.0);
        }
        assert_eq!(engine.state(), RhythmState::Failed);
        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|event| matches!(event, RhythmEvent::SequenceFailed { beat_index: 3 })));
        assert!(events
            .iter()
            .any(|event| matches!(event, RhythmEvent::ExhaustionCritical { .. })));
        assert!(!events
            .iter()
            .any(|event| matches!(event, RhythmEvent::SequenceCompleted { .. })));
    }

    #[test]
    fn live_tempo_never_moves_scheduled_beats() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        let map = make_map(&config, 12);
        let before = map.beats.clone();
        engine.start(map).expect("start");

        let mut windows = vec![engine.current_hit_window()];
        for _ in 0..8 {
            strike_current_beat(&mut engine, &clock, 0.0);
            windows.push(engine.current_hit_window());
        }
        assert_eq!(engine.current_tempo(), 94.0);
        assert_eq!(engine.beats(), before.as_slice());
        assert!(windows.windows(2).all(|pair| pair[1] <= pair[0]));
    }

    #[test]
    fn pause_holds_the_judge_clock() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 13)).expect("start");
        strike_current_beat(&mut engine, &clock, 0.0);

        engine.set_paused(true);
        clock.advance(10.0);
        engine.tick(None);
        assert_eq!(engine.counts(), (1, 0, 0));
        engine.set_paused(false);

        strike_current_beat(&mut engine, &clock, 0.0);
        assert_eq!(engine.counts(), (2, 0, 0));
    }

    #[test]
    fn approaching_beat_is_announced_once() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 14)).expect("start");

        clock.set(0.0);
        engine.tick(None);
        clock.set(0.2);
        engine.tick(None);
        let approaching = engine
            .drain_events()
            .into_iter()
            .filter(|event| matches!(event, RhythmEvent::BeatApproaching { .. }))
            .count();
        assert_eq!(approaching, 1);
    }

    #[test]
    fn empty_map_is_rejected_and_stays_idle() {
        let (mut engine, _clock) = make_engine(RhythmConfig::default());
        let result = engine.start(BeatMap {
            name: "empty".to_string(),
            base_tempo: 90.0,
            beats: Vec::new(),
        });
        assert!(matches!(result, Err(ConfigError::EmptyBeatMap)));
        assert_eq!(engine.state(), RhythmState::Idle);
        engine.tick(Some(InputKey::Left));
        assert!(engine.drain_events().is_empty());
    }

    #[test]
    fn stop_halts_without_rollback() {
        let config = RhythmConfig::default();
        let (mut engine, clock) = make_engine(config.clone());
        engine.start(make_map(&config, 15)).expect("start");
        strike_current_beat(&mut engine, &clock, 0.0);
        engine.stop();
        assert_eq!(engine.state(), RhythmState::Stopped);
        clock.advance(60.0);
        engine.tick(None);
        assert_eq!(engine.counts(), (1, 0, 0));
    }
}
