//! Projectile spawning, flight, and hit resolution

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use uuid::Uuid;

use super::combatant::Combatant;
use super::zone::SafeZone;

pub const PROJECTILE_SPEED: f32 = 600.0;
pub const PROJECTILE_RADIUS: f32 = 4.0;
pub const PROJECTILE_DAMAGE: f32 = 10.0;
/// Maximum projectile flight time in seconds
pub const PROJECTILE_LIFETIME: f32 = 2.0;
/// Angular spread applied to every shot, in radians
pub const AIM_SPREAD: f32 = 0.1;

/// Active projectile in a match
#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub damage: f32,
    pub radius: f32,
    pub spawned_at: f32,
}

impl Projectile {
    fn expired(&self, clock: f32) -> bool {
        clock - self.spawned_at >= PROJECTILE_LIFETIME
    }

    /// Circle-circle overlap test against a target hitbox
    fn overlaps(&self, target_x: f32, target_y: f32, target_radius: f32) -> bool {
        let dx = self.x - target_x;
        let dy = self.y - target_y;
        let combined = self.radius + target_radius;
        dx * dx + dy * dy <= combined * combined
    }
}

/// A resolved projectile hit
#[derive(Debug, Clone)]
pub struct HitRecord {
    pub projectile_id: Uuid,
    pub shooter_id: Uuid,
    pub target_id: Uuid,
    pub damage: f32,
    pub x: f32,
    pub y: f32,
    pub killed: bool,
}

/// Owns the live projectile set of one match
#[derive(Debug, Default)]
pub struct ProjectileEngine {
    projectiles: Vec<Projectile>,
}

impl ProjectileEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a projectile from `origin` toward `aim`. Returns `None` without
    /// side effects when the owner is dead, out of ammo, or still inside the
    /// personal fire cooldown; a refused shot is a no-op, not an error.
    pub fn fire(
        &mut self,
        owner: &mut Combatant,
        origin_x: f32,
        origin_y: f32,
        aim_x: f32,
        aim_y: f32,
        clock: f32,
        rng: &mut ChaCha8Rng,
    ) -> Option<Uuid> {
        if !owner.can_fire(clock) {
            return None;
        }

        let direction =
            (aim_y - origin_y).atan2(aim_x - origin_x) + rng.gen_range(-AIM_SPREAD..=AIM_SPREAD);

        owner.ammo -= 1;
        owner.last_fired_at = clock;
        owner.angle = direction;

        let id = Uuid::new_v4();
        self.projectiles.push(Projectile {
            id,
            owner_id: owner.id,
            x: origin_x,
            y: origin_y,
            vel_x: direction.cos() * PROJECTILE_SPEED,
            vel_y: direction.sin() * PROJECTILE_SPEED,
            damage: PROJECTILE_DAMAGE,
            radius: PROJECTILE_RADIUS,
            spawned_at: clock,
        });
        Some(id)
    }

    /// Advance all projectiles and resolve collisions.
    ///
    /// A projectile is destroyed when it leaves the zone, outlives its
    /// lifetime, or hits a living non-owner combatant. Targets are tested in
    /// roster (insertion) order and the first overlap wins, so one projectile
    /// never damages two combatants.
    pub fn tick(
        &mut self,
        dt: f32,
        clock: f32,
        zone: &SafeZone,
        roster: &mut [Combatant],
    ) -> Vec<HitRecord> {
        let mut hits = Vec::new();

        self.projectiles.retain_mut(|p| {
            p.x += p.vel_x * dt;
            p.y += p.vel_y * dt;

            if p.expired(clock) || !zone.contains(p.x, p.y) {
                return false;
            }

            for target in roster.iter_mut() {
                if !target.alive || target.id == p.owner_id {
                    continue;
                }
                if p.overlaps(target.x, target.y, target.radius) {
                    let killed = target.take_damage(p.damage, clock);
                    hits.push(HitRecord {
                        projectile_id: p.id,
                        shooter_id: p.owner_id,
                        target_id: target.id,
                        damage: p.damage,
                        x: p.x,
                        y: p.y,
                        killed,
                    });
                    return false;
                }
            }
            true
        });

        hits
    }

    pub fn projectiles(&self) -> &[Projectile] {
        &self.projectiles
    }

    pub fn len(&self) -> usize {
        self.projectiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projectiles.is_empty()
    }
}
