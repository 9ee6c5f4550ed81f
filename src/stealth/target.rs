use serde::Deserialize;

use crate::types::{PlayerView, Vec2};

/// What an agent looks for.
pub trait StealthTarget {
    fn position(&self) -> Vec2;
    fn is_hidden(&self) -> bool;
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HidingSpot {
    pub name: String,
    pub position: Vec2,
}

impl HidingSpot {
    pub fn new(name: &str, position: Vec2) -> Self {
        Self {
            name: name.to_string(),
            position,
        }
    }
}

/// The player's body in a stealth stage. Hiding snaps it into the spot and
/// pins it there until it steps out; a catch freezes it briefly.
#[derive(Clone, Debug)]
pub struct PlayerAvatar {
    position: Vec2,
    hidden_in: Option<usize>,
    frozen_for: f32,
}

impl PlayerAvatar {
    pub fn new(position: Vec2) -> Self {
        Self {
            position,
            hidden_in: None,
            frozen_for: 0.0,
        }
    }

    pub fn can_move(&self) -> bool {
        self.hidden_in.is_none() && self.frozen_for <= 0.0
    }

    pub fn hiding_spot(&self) -> Option<usize> {
        self.hidden_in
    }

    /// Returns whether the avatar actually moved.
    pub fn move_by(&mut self, delta: Vec2) -> bool {
        if !self.can_move() {
            return false;
        }
        self.position = self.position + delta;
        true
    }

    pub fn teleport(&mut self, position: Vec2) {
        self.position = position;
    }

    pub fn hide(&mut self, spot_index: usize, spot: &HidingSpot) {
        self.hidden_in = Some(spot_index);
        self.position = spot.position;
    }

    pub fn unhide(&mut self) -> bool {
        self.hidden_in.take().is_some()
    }

    pub fn freeze(&mut self, seconds: f32) {
        self.frozen_for = self.frozen_for.max(seconds);
    }

    pub fn tick(&mut self, dt: f32) {
        if self.frozen_for > 0.0 {
            self.frozen_for = (self.frozen_for - dt).max(0.0);
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            x: self.position.x,
            y: self.position.y,
            hidden: self.is_hidden(),
        }
    }
}

impl StealthTarget for PlayerAvatar {
    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_hidden(&self) -> bool {
        self.hidden_in.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hiding_pins_avatar_to_spot() {
        let spot = HidingSpot::new("basket", Vec2::new(2.0, -1.8));
        let mut avatar = PlayerAvatar::new(Vec2::new(1.5, -1.5));
        avatar.hide(3, &spot);
        assert!(avatar.is_hidden());
        assert_eq!(avatar.position(), spot.position);
        assert!(!avatar.move_by(Vec2::RIGHT));
        assert_eq!(avatar.position(), spot.position);

        assert!(avatar.unhide());
        assert!(!avatar.unhide());
        assert!(avatar.move_by(Vec2::RIGHT));
        assert_eq!(avatar.position(), Vec2::new(3.0, -1.8));
    }

    #[test]
    fn freeze_wears_off_with_time() {
        let mut avatar = PlayerAvatar::new(Vec2::ZERO);
        avatar.freeze(2.0);
        assert!(!avatar.can_move());
        avatar.tick(1.5);
        assert!(!avatar.can_move());
        avatar.tick(0.5);
        assert!(avatar.can_move());
    }
}
