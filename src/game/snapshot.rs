//! Snapshot building for the rendering boundary

use crate::ws::protocol::{
    CombatantSnapshot, GameEvent, ProjectileSnapshot, ServerMsg, ZoneStatus,
};

use super::combatant::Combatant;
use super::projectile::Projectile;

/// Tracks the snapshot cadence for one match; simulation runs faster than
/// clients need state, so only every Nth tick goes out on the wire.
pub struct SnapshotBuilder {
    ticks_since_snapshot: u32,
    snapshot_interval: u32,
}

impl SnapshotBuilder {
    pub fn new(snapshot_interval: u32) -> Self {
        Self {
            ticks_since_snapshot: 0,
            snapshot_interval: snapshot_interval.max(1),
        }
    }

    /// Check if it's time to send a snapshot
    pub fn should_send(&mut self) -> bool {
        self.ticks_since_snapshot += 1;
        if self.ticks_since_snapshot >= self.snapshot_interval {
            self.ticks_since_snapshot = 0;
            true
        } else {
            false
        }
    }

    /// Force a snapshot on the next check (terminal events)
    pub fn force_next(&mut self) {
        self.ticks_since_snapshot = self.snapshot_interval;
    }

    /// Build a snapshot message from read-only simulation state
    pub fn build(
        &self,
        tick: u64,
        zone: ZoneStatus,
        roster: &[Combatant],
        projectiles: &[Projectile],
        events: Vec<GameEvent>,
    ) -> ServerMsg {
        ServerMsg::Snapshot {
            tick,
            zone,
            combatants: roster
                .iter()
                .map(|c| CombatantSnapshot {
                    player_id: c.id,
                    x: c.x,
                    y: c.y,
                    vel_x: c.vel_x,
                    vel_y: c.vel_y,
                    angle: c.angle,
                    health: c.health,
                    ammo: c.ammo,
                    alive: c.alive,
                    is_bot: c.is_bot(),
                })
                .collect(),
            projectiles: projectiles
                .iter()
                .map(|p| ProjectileSnapshot {
                    id: p.id,
                    owner_id: p.owner_id,
                    x: p.x,
                    y: p.y,
                    vel_x: p.vel_x,
                    vel_y: p.vel_y,
                })
                .collect(),
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_sends_every_nth_tick() {
        let mut builder = SnapshotBuilder::new(3);
        let pattern: Vec<bool> = (0..6).map(|_| builder.should_send()).collect();
        assert_eq!(pattern, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn force_next_overrides_the_cadence() {
        let mut builder = SnapshotBuilder::new(10);
        assert!(!builder.should_send());
        builder.force_next();
        assert!(builder.should_send());
    }
}
