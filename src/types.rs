use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };
    pub const RIGHT: Self = Self { x: 1.0, y: 0.0 };
    pub const LEFT: Self = Self { x: -1.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Unit vector, or zero when the length is too small to normalise.
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len <= 1e-6 {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }

    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// Unsigned angle in degrees; zero if either vector is degenerate.
    pub fn angle_deg(self, other: Self) -> f32 {
        let denominator = self.length() * other.length();
        if denominator <= 1e-12 {
            return 0.0;
        }
        let cos = (self.dot(other) / denominator).clamp(-1.0, 1.0);
        cos.acos().to_degrees()
    }

    /// Steps toward `target` by at most `max_delta` without overshooting.
    pub fn move_towards(self, target: Self, max_delta: f32) -> Self {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_delta || dist <= 1e-6 {
            return target;
        }
        self + delta * (max_delta / dist)
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    Left,
    Right,
}

impl InputKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "left" | "q" => Some(Self::Left),
            "right" | "e" => Some(Self::Right),
            _ => None,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatRating {
    Perfect,
    Good,
    Miss,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RhythmState {
    Idle,
    Running,
    Completed,
    Failed,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionState {
    Unaware,
    Suspicious,
    Alerted,
    Searching,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BossPhase {
    Navigate,
    SpiritOrbs,
    BarrelPursuit,
    Defeated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    Obstacle,
    SpikedBarrel,
    Vine,
    SpiritOrb,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BeatEvent {
    pub index: usize,
    #[serde(rename = "scheduledTime")]
    pub scheduled_time: f64,
    #[serde(rename = "requiredInput")]
    pub required_input: InputKey,
    #[serde(rename = "difficultyTier")]
    pub difficulty_tier: u8,
    #[serde(rename = "triggersVision")]
    pub triggers_vision: bool,
    #[serde(rename = "snapshotTempo")]
    pub snapshot_tempo: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VisionChoice {
    pub label: String,
    pub text: String,
    pub flag: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RhythmEvent {
    BeatApproaching {
        beat: BeatEvent,
    },
    BeatResult {
        #[serde(rename = "beatIndex")]
        beat_index: usize,
        rating: BeatRating,
        offset: f64,
    },
    ExhaustionChanged {
        value: f32,
    },
    ExhaustionCritical {
        value: f32,
    },
    VisionTriggered {
        #[serde(rename = "visionIndex")]
        vision_index: usize,
        choices: Vec<VisionChoice>,
    },
    VisionResolved {
        flag: Option<String>,
    },
    SequenceCompleted {
        perfect: u32,
        good: u32,
        miss: u32,
    },
    SequenceFailed {
        #[serde(rename = "beatIndex")]
        beat_index: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StealthEvent {
    StateChanged {
        #[serde(rename = "agentId")]
        agent_id: String,
        from: DetectionState,
        to: DetectionState,
    },
    PlayerDetected {
        #[serde(rename = "agentId")]
        agent_id: String,
    },
    CatchCountChanged {
        count: u32,
    },
    StealthSequenceComplete,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BossEvent {
    PhaseChanged {
        phase: BossPhase,
    },
    HealthChanged {
        current: f32,
        max: f32,
    },
    HazardSpawned {
        id: u64,
        kind: HazardKind,
        x: f32,
        y: f32,
    },
    PlayerHit {
        #[serde(rename = "hazardId")]
        hazard_id: u64,
    },
    BossDefeated,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "category", content = "event", rename_all = "snake_case")]
pub enum RuntimeEvent {
    Rhythm(RhythmEvent),
    Stealth(StealthEvent),
    Boss(BossEvent),
}

#[derive(Clone, Debug, Serialize)]
pub struct RhythmView {
    pub state: RhythmState,
    #[serde(rename = "currentBeatIndex")]
    pub current_beat_index: usize,
    #[serde(rename = "totalBeats")]
    pub total_beats: usize,
    #[serde(rename = "currentTempo")]
    pub current_tempo: f32,
    #[serde(rename = "currentHitWindow")]
    pub current_hit_window: f32,
    pub exhaustion: f32,
    #[serde(rename = "exhaustionMax")]
    pub exhaustion_max: f32,
    #[serde(rename = "perfectCount")]
    pub perfect_count: u32,
    #[serde(rename = "goodCount")]
    pub good_count: u32,
    #[serde(rename = "missCount")]
    pub miss_count: u32,
    #[serde(rename = "visionPending")]
    pub vision_pending: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct AgentView {
    pub id: String,
    pub x: f32,
    pub y: f32,
    #[serde(rename = "facingX")]
    pub facing_x: f32,
    #[serde(rename = "facingY")]
    pub facing_y: f32,
    pub state: DetectionState,
    #[serde(rename = "lastKnownX")]
    pub last_known_x: f32,
    #[serde(rename = "lastKnownY")]
    pub last_known_y: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub x: f32,
    pub y: f32,
    pub hidden: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct StealthView {
    pub active: bool,
    #[serde(rename = "catchCount")]
    pub catch_count: u32,
    #[serde(rename = "maxCatches")]
    pub max_catches: u32,
    pub agents: Vec<AgentView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct HazardView {
    pub id: u64,
    pub kind: HazardKind,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    #[serde(rename = "lifetimeLeft")]
    pub lifetime_left: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct BossView {
    pub phase: BossPhase,
    pub health: f32,
    #[serde(rename = "maxHealth")]
    pub max_health: f32,
    #[serde(rename = "isSlowed")]
    pub is_slowed: bool,
    #[serde(rename = "orbsUsedInPhase2")]
    pub orbs_used_in_phase2: u32,
    #[serde(rename = "barrelsLaunched")]
    pub barrels_launched: u32,
    pub x: f32,
    pub y: f32,
    pub alpha: f32,
    pub hazards: Vec<HazardView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "elapsedSeconds")]
    pub elapsed_seconds: f64,
    pub paused: bool,
    pub player: PlayerView,
    #[serde(rename = "spiritOrbs")]
    pub spirit_orbs: u32,
    pub rhythm: Option<RhythmView>,
    pub stealth: Option<StealthView>,
    pub boss: Option<BossView>,
    pub events: Vec<RuntimeEvent>,
}
