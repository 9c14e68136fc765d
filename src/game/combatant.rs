//! Combatant: the shared capability set behind human and bot fighters

use uuid::Uuid;

use super::bot::BotAgent;

pub const MAX_HEALTH: f32 = 100.0;
pub const HITBOX_RADIUS: f32 = 20.0;
pub const STARTING_AMMO: u32 = 120;
/// Minimum seconds between two shots from one combatant
pub const FIRE_COOLDOWN: f32 = 0.25;
/// Score awarded to a human player for a kill
pub const KILL_BONUS: u32 = 50;

/// Who is steering this combatant
#[derive(Debug, Clone)]
pub enum Controller {
    /// A connected client; state arrives over the relay
    Remote,
    /// Server-driven bot
    Bot(BotAgent),
}

/// One fighter in a match. Bots and remote players are identical to the
/// projectile and targeting layers; only the controller differs.
#[derive(Debug, Clone)]
pub struct Combatant {
    pub id: Uuid,
    pub display_name: String,
    pub cosmetic_ref: Option<String>,

    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub angle: f32,

    pub health: f32,
    pub ammo: u32,
    pub alive: bool,
    pub radius: f32,

    /// Match-clock timestamp of the last successful shot
    pub last_fired_at: f32,
    /// Match-clock timestamp of the last zone damage application
    pub last_zone_damage_at: f32,
    /// Match-clock timestamp of death, for placement ordering
    pub died_at: Option<f32>,

    pub kills: u32,
    pub score: u32,

    pub controller: Controller,
}

impl Combatant {
    fn new(
        id: Uuid,
        display_name: String,
        cosmetic_ref: Option<String>,
        x: f32,
        y: f32,
        angle: f32,
        controller: Controller,
    ) -> Self {
        Self {
            id,
            display_name,
            cosmetic_ref,
            x,
            y,
            vel_x: 0.0,
            vel_y: 0.0,
            angle,
            health: MAX_HEALTH,
            ammo: STARTING_AMMO,
            alive: true,
            radius: HITBOX_RADIUS,
            last_fired_at: f32::NEG_INFINITY,
            last_zone_damage_at: f32::NEG_INFINITY,
            died_at: None,
            kills: 0,
            score: 0,
            controller,
        }
    }

    pub fn remote(
        id: Uuid,
        display_name: String,
        cosmetic_ref: Option<String>,
        x: f32,
        y: f32,
        angle: f32,
    ) -> Self {
        Self::new(id, display_name, cosmetic_ref, x, y, angle, Controller::Remote)
    }

    pub fn bot(id: Uuid, display_name: String, agent: BotAgent, x: f32, y: f32, angle: f32) -> Self {
        Self::new(id, display_name, None, x, y, angle, Controller::Bot(agent))
    }

    pub fn is_bot(&self) -> bool {
        matches!(self.controller, Controller::Bot(_))
    }

    /// Fire-gate check: alive, ammo left, personal cooldown elapsed
    pub fn can_fire(&self, clock: f32) -> bool {
        self.alive && self.ammo > 0 && clock - self.last_fired_at >= FIRE_COOLDOWN
    }

    /// Apply damage. Returns true when this damage killed the combatant.
    /// Death is one-way: a dead combatant takes no further damage and is
    /// never brought back within a match.
    pub fn take_damage(&mut self, damage: f32, clock: f32) -> bool {
        if !self.alive {
            return false;
        }
        self.health = (self.health - damage).max(0.0);
        if self.health <= 0.0 {
            self.alive = false;
            self.died_at = Some(clock);
            return true;
        }
        false
    }

    /// Unconditional elimination (client-reported death, disconnect cleanup)
    pub fn mark_dead(&mut self, clock: f32) {
        if self.alive {
            self.alive = false;
            self.health = 0.0;
            self.died_at = Some(clock);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fighter() -> Combatant {
        Combatant::remote(Uuid::new_v4(), "Test".into(), None, 0.0, 0.0, 0.0)
    }

    #[test]
    fn damage_clamps_health_and_kills_once() {
        let mut c = fighter();
        assert!(!c.take_damage(40.0, 1.0));
        assert_eq!(c.health, 60.0);
        assert!(c.take_damage(90.0, 2.0));
        assert_eq!(c.health, 0.0);
        assert!(!c.alive);
        assert_eq!(c.died_at, Some(2.0));

        // No further damage, no second kill, death time untouched
        assert!(!c.take_damage(10.0, 3.0));
        assert_eq!(c.died_at, Some(2.0));
    }

    #[test]
    fn fire_gate_enforces_cooldown_and_ammo() {
        let mut c = fighter();
        assert!(c.can_fire(0.0));
        c.last_fired_at = 10.0;
        assert!(!c.can_fire(10.0 + FIRE_COOLDOWN / 2.0));
        assert!(c.can_fire(10.0 + FIRE_COOLDOWN));

        c.ammo = 0;
        assert!(!c.can_fire(20.0));

        c.ammo = 5;
        c.alive = false;
        assert!(!c.can_fire(20.0));
    }

    #[test]
    fn mark_dead_is_idempotent() {
        let mut c = fighter();
        c.mark_dead(4.0);
        c.mark_dead(9.0);
        assert!(!c.alive);
        assert_eq!(c.health, 0.0);
        assert_eq!(c.died_at, Some(4.0));
    }
}
