use crate::constants::{
    BARREL_HIT_RADIUS, BARREL_SPIN_FACTOR, ORB_HIT_RADIUS, ORB_PROJECTILE_LIFETIME_SECONDS,
    ORB_PROJECTILE_SPEED, VINE_BASE_OFFSET, VINE_JITTER, VINE_SPACING,
};
use crate::rng::RandomSource;
use crate::types::{HazardKind, HazardView, Vec2};

#[derive(Clone, Debug)]
struct HazardInternal {
    view: HazardView,
    speed: f32,
}

impl HazardInternal {
    fn position(&self) -> Vec2 {
        Vec2::new(self.view.x, self.view.y)
    }

    fn set_position(&mut self, position: Vec2) {
        self.view.x = position.x;
        self.view.y = position.y;
    }
}

/// Result of advancing the hazard field by one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HazardTick {
    /// Barrels that reached the player this tick (already removed).
    pub player_hits: Vec<u64>,
}

/// Every live hazard of a boss fight, each with its own lifetime.
#[derive(Clone, Debug, Default)]
pub struct HazardField {
    hazards: Vec<HazardInternal>,
    next_id: u64,
}

impl HazardField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.hazards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hazards.is_empty()
    }

    pub fn clear(&mut self) {
        self.hazards.clear();
    }

    pub fn count_of(&self, kind: HazardKind) -> usize {
        self.hazards
            .iter()
            .filter(|hazard| hazard.view.kind == kind)
            .count()
    }

    pub fn views(&self) -> Vec<HazardView> {
        self.hazards.iter().map(|hazard| hazard.view.clone()).collect()
    }

    /// Drops an obstacle at a random spawn point. `None` when there are no
    /// spawn points to choose from.
    pub fn spawn_obstacle(
        &mut self,
        spawn_points: &[Vec2],
        rng: &mut dyn RandomSource,
        lifetime: f32,
    ) -> Option<HazardView> {
        if spawn_points.is_empty() {
            return None;
        }
        let at = spawn_points[rng.pick_index(spawn_points.len())];
        Some(self.spawn(HazardKind::Obstacle, at, 0.0, lifetime))
    }

    pub fn spawn_barrel(&mut self, at: Vec2, speed: f32, lifetime: f32) -> HazardView {
        self.spawn(HazardKind::SpikedBarrel, at, speed, lifetime)
    }

    /// Stationary vines ahead of the player, spaced out with some jitter.
    pub fn spawn_vine_cluster(
        &mut self,
        player: Vec2,
        count: u32,
        rng: &mut dyn RandomSource,
        lifetime: f32,
    ) -> Vec<HazardView> {
        (0..count)
            .map(|i| {
                let dx = rng.range_f32(-VINE_JITTER, VINE_JITTER)
                    + VINE_BASE_OFFSET
                    + i as f32 * VINE_SPACING;
                self.spawn(HazardKind::Vine, Vec2::new(player.x + dx, player.y), 0.0, lifetime)
            })
            .collect()
    }

    pub fn spawn_orb(&mut self, from: Vec2) -> HazardView {
        self.spawn(
            HazardKind::SpiritOrb,
            from,
            ORB_PROJECTILE_SPEED,
            ORB_PROJECTILE_LIFETIME_SECONDS,
        )
    }

    /// Ages every hazard and moves the mobile ones: barrels home in on the
    /// player, orbs fly at the boss. An orb only carries the visual of a hit
    /// that was already applied, so it despawns silently on arrival.
    pub fn tick(&mut self, dt: f32, player: Vec2, boss: Vec2) -> HazardTick {
        let mut result = HazardTick::default();

        self.hazards.retain_mut(|hazard| {
            hazard.view.lifetime_left -= dt;
            if hazard.view.lifetime_left <= 0.0 {
                return false;
            }
            match hazard.view.kind {
                HazardKind::SpikedBarrel => {
                    let next = hazard.position().move_towards(player, hazard.speed * dt);
                    hazard.set_position(next);
                    hazard.view.rotation -= hazard.speed * BARREL_SPIN_FACTOR * dt;
                    if next.distance(player) <= BARREL_HIT_RADIUS {
                        result.player_hits.push(hazard.view.id);
                        return false;
                    }
                    true
                }
                HazardKind::SpiritOrb => {
                    let next = hazard.position().move_towards(boss, hazard.speed * dt);
                    hazard.set_position(next);
                    next.distance(boss) >= ORB_HIT_RADIUS
                }
                HazardKind::Obstacle | HazardKind::Vine => true,
            }
        });

        result
    }

    fn spawn(&mut self, kind: HazardKind, at: Vec2, speed: f32, lifetime: f32) -> HazardView {
        self.next_id += 1;
        let view = HazardView {
            id: self.next_id,
            kind,
            x: at.x,
            y: at.y,
            rotation: 0.0,
            lifetime_left: lifetime,
        };
        self.hazards.push(HazardInternal {
            view: view.clone(),
            speed,
        });
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::Rng;

    #[test]
    fn obstacles_use_spawn_points_and_expire() {
        let mut field = HazardField::new();
        let points = [Vec2::new(-7.0, 0.0), Vec2::new(7.0, 0.0)];
        let mut rng = Rng::new(9);

        let obstacle = field
            .spawn_obstacle(&points, &mut rng, 5.0)
            .expect("spawn points exist");
        assert!(points.contains(&Vec2::new(obstacle.x, obstacle.y)));
        assert!(field.spawn_obstacle(&[], &mut rng, 5.0).is_none());

        for _ in 0..9 {
            field.tick(0.5, Vec2::new(50.0, 0.0), Vec2::ZERO);
        }
        assert_eq!(field.len(), 1);
        field.tick(0.5, Vec2::new(50.0, 0.0), Vec2::ZERO);
        assert!(field.is_empty());
    }

    #[test]
    fn barrel_tracks_player_spins_and_hits() {
        let mut field = HazardField::new();
        let barrel = field.spawn_barrel(Vec2::new(8.0, 0.0), 6.0, 8.0);
        let player = Vec2::new(2.0, 0.0);

        let first = field.tick(0.5, player, Vec2::ZERO);
        assert!(first.player_hits.is_empty());
        let view = &field.views()[0];
        assert_eq!(view.x, 5.0);
        assert_eq!(view.rotation, -150.0);

        let second = field.tick(0.5, player, Vec2::ZERO);
        assert_eq!(second.player_hits, vec![barrel.id]);
        assert!(field.is_empty());
    }

    #[test]
    fn vines_spread_ahead_of_player() {
        let mut field = HazardField::new();
        let vines = field.spawn_vine_cluster(Vec2::new(1.0, -2.0), 3, &mut Rng::new(4), 8.0);
        assert_eq!(vines.len(), 3);
        for (i, vine) in vines.iter().enumerate() {
            let dx = vine.x - 1.0;
            let centre = VINE_BASE_OFFSET + i as f32 * VINE_SPACING;
            assert!((dx - centre).abs() <= VINE_JITTER + 1e-4);
            assert_eq!(vine.y, -2.0);
        }
        assert_eq!(field.count_of(HazardKind::Vine), 3);
    }

    #[test]
    fn orb_flies_into_boss() {
        let mut field = HazardField::new();
        field.spawn_orb(Vec2::new(-6.0, 0.0));
        let first = field.tick(0.3, Vec2::ZERO, Vec2::new(1.0, 0.0));
        assert_eq!(first, HazardTick::default());
        assert_eq!(field.count_of(HazardKind::SpiritOrb), 1);
        let second = field.tick(0.5, Vec2::ZERO, Vec2::new(1.0, 0.0));
        assert_eq!(second, HazardTick::default());
        assert!(field.is_empty());
    }
}
