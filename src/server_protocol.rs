use serde_json::Value;

use crate::types::InputKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encounter {
    Rhythm,
    Stealth,
    Boss,
}

impl Encounter {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rhythm" => Some(Self::Rhythm),
            "stealth" => Some(Self::Stealth),
            "boss" => Some(Self::Boss),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum ParsedClientMessage {
    Start {
        encounter: Encounter,
        stage: Option<String>,
        seed: Option<i64>,
    },
    Press {
        key: InputKey,
    },
    VisionChoice {
        index: usize,
    },
    Move {
        dx: f32,
        dy: f32,
    },
    Hide,
    Unhide,
    CollectOrb,
    UseOrb,
    DamageBoss {
        amount: f32,
    },
    Pause {
        paused: bool,
    },
    Stop {
        encounter: Option<Encounter>,
    },
    Ping {
        t: f64,
    },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "start" => {
            let encounter = Encounter::parse(object.get("encounter")?.as_str()?)?;
            let stage = match object.get("stage") {
                None => None,
                Some(value) => Some(value.as_str()?.to_string()),
            };
            let seed = match object.get("seed") {
                None => None,
                Some(value) => Some(value.as_i64()?),
            };
            Some(ParsedClientMessage::Start {
                encounter,
                stage,
                seed,
            })
        }
        "press" => {
            let key = InputKey::parse(object.get("key")?.as_str()?)?;
            Some(ParsedClientMessage::Press { key })
        }
        "vision_choice" => {
            let index = usize::try_from(object.get("index")?.as_u64()?).ok()?;
            Some(ParsedClientMessage::VisionChoice { index })
        }
        "move" => {
            let dx = parse_finite(object.get("dx"))?;
            let dy = parse_finite(object.get("dy"))?;
            Some(ParsedClientMessage::Move { dx, dy })
        }
        "hide" => Some(ParsedClientMessage::Hide),
        "unhide" => Some(ParsedClientMessage::Unhide),
        "collect_orb" => Some(ParsedClientMessage::CollectOrb),
        "use_orb" => Some(ParsedClientMessage::UseOrb),
        "damage_boss" => {
            let amount = parse_finite(object.get("amount"))?;
            Some(ParsedClientMessage::DamageBoss { amount })
        }
        "pause" => {
            let paused = object.get("paused")?.as_bool()?;
            Some(ParsedClientMessage::Pause { paused })
        }
        "stop" => {
            let encounter = match object.get("encounter") {
                None => None,
                Some(value) => Some(Encounter::parse(value.as_str()?)?),
            };
            Some(ParsedClientMessage::Stop { encounter })
        }
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

/// Numbers that survive the trip to `f32` without becoming infinite.
fn parse_finite(value: Option<&Value>) -> Option<f32> {
    let number = value?.as_f64()?;
    if !number.is_finite() || number.abs() > f64::from(f32::MAX) {
        return None;
    }
    Some(number as f32)
}
