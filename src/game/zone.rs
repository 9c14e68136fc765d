//! Safe zone model: grace countdown, shrink, out-of-zone damage

use crate::ws::protocol::ZoneStatus;

/// Radius below which the shrink rate accelerates, bounding match length
pub const SHRINK_ACCEL_RADIUS: f32 = 500.0;
pub const SHRINK_ACCEL_FACTOR: f32 = 1.5;

/// Damage multiplier grows by 1 per this many units outside the zone
pub const DAMAGE_DISTANCE_SCALE: f32 = 100.0;
pub const MAX_DAMAGE_MULTIPLIER: f32 = 3.0;

/// Out-of-zone damage is applied per combatant at this cadence (seconds),
/// not every tick, so brief border crossings are not punished
pub const ZONE_DAMAGE_INTERVAL: f32 = 0.5;

/// Zone configuration for a match
#[derive(Debug, Clone)]
pub struct ZoneConfig {
    pub initial_radius: f32,
    /// Seconds after match start before the zone begins shrinking
    pub grace_secs: f32,
    /// Shrink rate in units per second
    pub shrink_rate: f32,
    /// Base out-of-zone damage per second
    pub base_damage_per_second: f32,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            initial_radius: 1500.0,
            grace_secs: 10.0,
            shrink_rate: 12.0,
            base_damage_per_second: 8.0,
        }
    }
}

/// The shrinking safe zone.
///
/// State machine: waiting (countdown > 0) -> shrinking -> terminal (radius 0).
/// The radius never increases once shrinking has begun.
#[derive(Debug, Clone)]
pub struct SafeZone {
    pub center_x: f32,
    pub center_y: f32,
    pub initial_radius: f32,
    radius: f32,
    countdown: f32,
    shrinking: bool,
    shrink_rate: f32,
    base_damage: f32,
}

impl SafeZone {
    pub fn new(config: &ZoneConfig) -> Self {
        Self {
            center_x: 0.0,
            center_y: 0.0,
            initial_radius: config.initial_radius,
            radius: config.initial_radius,
            countdown: config.grace_secs,
            shrinking: false,
            shrink_rate: config.shrink_rate,
            base_damage: config.base_damage_per_second,
        }
    }

    /// Advance the zone by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if !self.shrinking {
            self.countdown -= dt;
            if self.countdown <= 0.0 {
                self.countdown = 0.0;
                self.shrinking = true;
            }
            return;
        }

        let rate = if self.radius < SHRINK_ACCEL_RADIUS {
            self.shrink_rate * SHRINK_ACCEL_FACTOR
        } else {
            self.shrink_rate
        };
        self.radius = (self.radius - rate * dt).max(0.0);
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn shrinking(&self) -> bool {
        self.shrinking
    }

    pub fn collapsed(&self) -> bool {
        self.shrinking && self.radius <= 0.0
    }

    /// Check if a point is inside the zone
    pub fn contains(&self, x: f32, y: f32) -> bool {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        dx * dx + dy * dy <= self.radius * self.radius
    }

    /// Distance from a point to the zone center
    pub fn distance_from_center(&self, x: f32, y: f32) -> f32 {
        let dx = x - self.center_x;
        let dy = y - self.center_y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance beyond the zone edge (0 inside)
    pub fn distance_outside(&self, x: f32, y: f32) -> f32 {
        (self.distance_from_center(x, y) - self.radius).max(0.0)
    }

    /// Out-of-zone damage per second at a point. Zero inside the zone;
    /// outside it scales linearly with excess distance, capped at 3x base.
    pub fn damage_per_second_at(&self, x: f32, y: f32) -> f32 {
        // Terminal state: no safe ground left anywhere
        if self.collapsed() {
            return self.base_damage * MAX_DAMAGE_MULTIPLIER;
        }
        let outside = self.distance_outside(x, y);
        if outside <= 0.0 {
            return 0.0;
        }
        let multiplier = (1.0 + outside / DAMAGE_DISTANCE_SCALE).min(MAX_DAMAGE_MULTIPLIER);
        self.base_damage * multiplier
    }

    /// Pull a point back inside the zone, `margin` units short of the edge.
    /// Points already inside are returned unchanged.
    pub fn clamp_inside(&self, x: f32, y: f32, margin: f32) -> (f32, f32) {
        let dist = self.distance_from_center(x, y);
        let limit = (self.radius - margin).max(0.0);
        if dist <= limit || dist < f32::EPSILON {
            return (x, y);
        }
        let scale = limit / dist;
        (
            self.center_x + (x - self.center_x) * scale,
            self.center_y + (y - self.center_y) * scale,
        )
    }

    pub fn status(&self) -> ZoneStatus {
        ZoneStatus {
            center_x: self.center_x,
            center_y: self.center_y,
            radius: self.radius,
            initial_radius: self.initial_radius,
            countdown: self.countdown,
            shrinking: self.shrinking,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(initial_radius: f32, grace_secs: f32, shrink_rate: f32, base_dps: f32) -> SafeZone {
        SafeZone::new(&ZoneConfig {
            initial_radius,
            grace_secs,
            shrink_rate,
            base_damage_per_second: base_dps,
        })
    }

    #[test]
    fn countdown_gates_the_shrink() {
        let mut z = zone(1000.0, 3.0, 10.0, 8.0);
        z.tick(1.0);
        assert!(!z.shrinking());
        assert_eq!(z.radius(), 1000.0);
        z.tick(1.0);
        z.tick(1.0);
        assert!(z.shrinking());
    }

    #[test]
    fn radius_is_monotonic_and_nonnegative_once_shrinking() {
        let mut z = zone(1500.0, 0.0, 11.3, 8.0);
        z.tick(0.1); // flips to shrinking
        let mut prev = z.radius();
        for i in 0..5000 {
            let dt = if i % 3 == 0 { 0.033 } else { 0.05 };
            z.tick(dt);
            assert!(z.radius() <= prev, "radius increased");
            assert!(z.radius() >= 0.0);
            prev = z.radius();
        }
        assert!(z.collapsed());
    }

    #[test]
    fn shrink_accelerates_below_threshold() {
        let mut z = zone(600.0, 0.0, 10.0, 8.0);
        z.tick(0.0);
        z.tick(1.0);
        assert!((z.radius() - 590.0).abs() < 1e-3);

        let mut small = zone(400.0, 0.0, 10.0, 8.0);
        small.tick(0.0);
        small.tick(1.0);
        assert!((small.radius() - 385.0).abs() < 1e-3); // 10 * 1.5
    }

    #[test]
    fn full_collapse_after_1875_unit_ticks() {
        // radius 1500, rate 0.8 per one-second tick
        let mut z = zone(1500.0, 0.0, 0.8, 8.0);
        z.tick(0.0);
        for _ in 0..1875 {
            z.tick(1.0);
        }
        assert_eq!(z.radius(), 0.0);
        for _ in 0..100 {
            z.tick(1.0);
            assert_eq!(z.radius(), 0.0);
        }
    }

    #[test]
    fn damage_multiplier_capped_between_one_and_three() {
        let z = zone(1000.0, 0.0, 10.0, 1.0);
        assert_eq!(z.damage_per_second_at(0.0, 500.0), 0.0);
        assert_eq!(z.damage_per_second_at(1000.0, 0.0), 0.0); // on the edge counts as inside
        for distance in [1.0_f32, 50.0, 150.0, 400.0, 10_000.0] {
            let dps = z.damage_per_second_at(1000.0 + distance, 0.0);
            assert!(dps >= 1.0 && dps <= 3.0, "dps {} out of bounds", dps);
        }
    }

    #[test]
    fn damage_scales_linearly_with_excess_distance() {
        // 150 beyond a radius-1000 zone: multiplier min(3, 1 + 150/100) = 2.5
        let z = zone(1000.0, 0.0, 10.0, 1.0);
        let dps = z.damage_per_second_at(1150.0, 0.0);
        assert!((dps - 2.5).abs() < 1e-4);
    }

    #[test]
    fn collapsed_zone_damages_everywhere_at_the_cap() {
        let mut z = zone(10.0, 0.0, 100.0, 2.0);
        z.tick(0.0);
        z.tick(1.0);
        assert!(z.collapsed());
        assert_eq!(z.damage_per_second_at(0.0, 0.0), 6.0);
        assert_eq!(z.damage_per_second_at(500.0, 0.0), 6.0);
    }

    #[test]
    fn clamp_inside_pulls_points_toward_center() {
        let z = zone(1000.0, 0.0, 10.0, 8.0);
        let (x, y) = z.clamp_inside(2000.0, 0.0, 100.0);
        assert!((x - 900.0).abs() < 1e-3);
        assert_eq!(y, 0.0);
        // Inside points are untouched
        assert_eq!(z.clamp_inside(10.0, 20.0, 100.0), (10.0, 20.0));
    }
}
