//! Per-match simulation aggregate and tick orchestration

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;
use uuid::Uuid;

use crate::ws::protocol::{CombatantResult, GameEvent, MatchStats};

use super::bot::BotDirector;
use super::combatant::{Combatant, Controller, KILL_BONUS, MAX_HEALTH};
use super::projectile::{HitRecord, Projectile, ProjectileEngine};
use super::zone::{SafeZone, ZoneConfig, ZONE_DAMAGE_INTERVAL};

/// Terminal result of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Winner(Uuid),
    Draw,
}

/// Wire events for one resolved hit
fn hit_events(hit: HitRecord) -> Vec<GameEvent> {
    let mut events = vec![GameEvent::Hit {
        shooter_id: hit.shooter_id,
        target_id: hit.target_id,
        damage: hit.damage,
        x: hit.x,
        y: hit.y,
    }];
    if hit.killed {
        events.push(GameEvent::Kill {
            killer_id: Some(hit.shooter_id),
            victim_id: hit.target_id,
            cause: "shot".to_string(),
        });
    }
    events
}

/// One match from start to resolution. Owns the zone, the roster
/// (insertion order is the collision tie-break order), the projectile set,
/// and the match RNG. All mutation happens through `tick` and the
/// `apply_remote_*` ingestion methods called from the owning room task.
pub struct MatchSession {
    clock: f32,
    tick: u64,
    zone: SafeZone,
    roster: Vec<Combatant>,
    engine: ProjectileEngine,
    rng: ChaCha8Rng,
    outcome: Option<MatchOutcome>,
}

impl MatchSession {
    pub fn new(seed: u64, zone_config: &ZoneConfig, roster: Vec<Combatant>) -> Self {
        Self {
            clock: 0.0,
            tick: 0,
            zone: SafeZone::new(zone_config),
            roster,
            engine: ProjectileEngine::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            outcome: None,
        }
    }

    /// Advance the match by one tick. Fixed order: zone, bots, projectiles,
    /// zone damage, then exactly one win-condition check. Once an outcome is
    /// set the session is frozen and ticks are no-ops.
    pub fn tick(&mut self, dt: f32) -> Vec<GameEvent> {
        if self.outcome.is_some() {
            return Vec::new();
        }

        self.tick += 1;
        self.clock += dt;

        self.zone.tick(dt);

        let mut events = BotDirector::tick(
            &mut self.roster,
            &self.zone,
            &mut self.engine,
            self.clock,
            dt,
            &mut self.rng,
        );

        let hits = self
            .engine
            .tick(dt, self.clock, &self.zone, &mut self.roster);
        for hit in &hits {
            self.credit_hit(hit);
        }
        events.extend(hits.into_iter().flat_map(hit_events));

        events.extend(self.apply_zone_damage());

        self.check_win_condition();

        events
    }

    /// Credit the shooter with the hit; the kill bonus goes to human
    /// players only, kill counts to everyone.
    fn credit_hit(&mut self, hit: &HitRecord) {
        if !hit.killed {
            return;
        }
        if let Some(shooter) = self.roster.iter_mut().find(|c| c.id == hit.shooter_id) {
            shooter.kills += 1;
            if matches!(shooter.controller, Controller::Remote) {
                shooter.score += KILL_BONUS;
            }
        }
    }

    /// Out-of-zone damage at a fixed per-combatant cadence, applied
    /// uniformly to bots and remote members.
    fn apply_zone_damage(&mut self) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for combatant in self.roster.iter_mut() {
            if !combatant.alive {
                continue;
            }
            let dps = self.zone.damage_per_second_at(combatant.x, combatant.y);
            if dps <= 0.0 {
                continue;
            }
            if self.clock - combatant.last_zone_damage_at < ZONE_DAMAGE_INTERVAL {
                continue;
            }
            combatant.last_zone_damage_at = self.clock;

            let damage = dps * ZONE_DAMAGE_INTERVAL;
            let killed = combatant.take_damage(damage, self.clock);
            events.push(GameEvent::ZoneDamage {
                player_id: combatant.id,
                damage,
            });
            if killed {
                events.push(GameEvent::Kill {
                    killer_id: None,
                    victim_id: combatant.id,
                    cause: "zone".to_string(),
                });
            }
        }
        events
    }

    /// Evaluated once per tick, after damage and collisions
    fn check_win_condition(&mut self) {
        let mut alive = self.roster.iter().filter(|c| c.alive);
        match (alive.next(), alive.next()) {
            (Some(last), None) => {
                debug!(winner = %last.id, "match resolved");
                self.outcome = Some(MatchOutcome::Winner(last.id));
            }
            (None, _) => {
                self.outcome = Some(MatchOutcome::Draw);
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Remote state ingestion (the relay trust boundary)
    // ------------------------------------------------------------------

    /// Accept a client-reported state verbatim. The single exception to the
    /// trust model: a dead combatant stays dead for the rest of the match.
    pub fn apply_remote_position(
        &mut self,
        player_id: Uuid,
        x: f32,
        y: f32,
        angle: f32,
        health: f32,
        alive: bool,
    ) {
        let clock = self.clock;
        if let Some(c) = self.roster.iter_mut().find(|c| c.id == player_id) {
            if !c.alive {
                return;
            }
            c.x = x;
            c.y = y;
            c.angle = angle;
            c.health = health.clamp(0.0, MAX_HEALTH);
            if !alive || c.health <= 0.0 {
                c.mark_dead(clock);
            }
        }
    }

    /// Mirror a client shot into the simulation. Subject to the same ammo
    /// and cooldown gates as bot fire; a refused shot is silently dropped.
    pub fn apply_remote_shot(
        &mut self,
        player_id: Uuid,
        origin_x: f32,
        origin_y: f32,
        aim_x: f32,
        aim_y: f32,
    ) -> Option<Uuid> {
        let clock = self.clock;
        let shooter = self.roster.iter_mut().find(|c| c.id == player_id)?;
        self.engine
            .fire(shooter, origin_x, origin_y, aim_x, aim_y, clock, &mut self.rng)
    }

    /// Client-reported elimination
    pub fn apply_remote_death(&mut self, victim_id: Uuid) {
        let clock = self.clock;
        if let Some(c) = self.roster.iter_mut().find(|c| c.id == victim_id) {
            c.mark_dead(clock);
        }
    }

    /// Admit a combatant after the match has started (a join that was
    /// assigned right as the countdown elapsed). Appending keeps the
    /// collision tie-break order stable for everyone already fighting.
    pub fn add_combatant(&mut self, combatant: Combatant) {
        self.roster.push(combatant);
    }

    /// Drop a disconnected member from the roster; the match continues for
    /// everyone else and the next tick's win check sees the smaller field.
    pub fn remove_combatant(&mut self, player_id: Uuid) {
        self.roster.retain(|c| c.id != player_id);
    }

    // ------------------------------------------------------------------
    // Read-only accessors for the snapshot/rendering boundary
    // ------------------------------------------------------------------

    pub fn zone(&self) -> &SafeZone {
        &self.zone
    }

    pub fn roster(&self) -> &[Combatant] {
        &self.roster
    }

    pub fn projectiles(&self) -> &[Projectile] {
        self.engine.projectiles()
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Final standings: survivors first, then by time of death, latest first
    pub fn build_stats(&self) -> MatchStats {
        let mut order: Vec<&Combatant> = self.roster.iter().collect();
        order.sort_by(|a, b| match (a.died_at, b.died_at) {
            (None, None) => std::cmp::Ordering::Equal,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (Some(_), None) => std::cmp::Ordering::Greater,
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(std::cmp::Ordering::Equal),
        });

        MatchStats {
            duration_secs: self.clock as u32,
            total_combatants: self.roster.len() as u32,
            placements: order
                .into_iter()
                .enumerate()
                .map(|(i, c)| CombatantResult {
                    player_id: c.id,
                    display_name: c.display_name.clone(),
                    is_bot: c.is_bot(),
                    kills: c.kills,
                    score: c.score,
                    placement: (i + 1) as u32,
                    alive_time_secs: c.died_at.unwrap_or(self.clock) as u32,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::bot::BotAgent;
    use crate::util::time::tick_delta;

    fn quiet_zone() -> ZoneConfig {
        ZoneConfig {
            initial_radius: 5000.0,
            grace_secs: 600.0,
            ..ZoneConfig::default()
        }
    }

    fn remote_at(x: f32, y: f32) -> Combatant {
        Combatant::remote(Uuid::new_v4(), "r".into(), None, x, y, 0.0)
    }

    #[test]
    fn survivor_is_declared_winner_on_the_killing_tick() {
        let shooter = remote_at(0.0, 0.0);
        let shooter_id = shooter.id;
        let mut victim = remote_at(100.0, 0.0);
        victim.health = 5.0;
        let victim_id = victim.id;

        let mut session = MatchSession::new(3, &quiet_zone(), vec![shooter, victim]);
        session
            .apply_remote_shot(shooter_id, 0.0, 0.0, 100.0, 0.0)
            .expect("shot accepted");

        for _ in 0..30 {
            session.tick(tick_delta());
            let victim_alive = session
                .roster()
                .iter()
                .find(|c| c.id == victim_id)
                .unwrap()
                .alive;
            if !victim_alive {
                // Same-tick resolution: the survivor is already the winner
                assert_eq!(session.outcome(), Some(MatchOutcome::Winner(shooter_id)));
                // Human shooter got the kill bonus
                let shooter = session.roster().iter().find(|c| c.id == shooter_id).unwrap();
                assert_eq!(shooter.kills, 1);
                assert_eq!(shooter.score, KILL_BONUS);
                return;
            }
        }
        panic!("projectile never connected");
    }

    #[test]
    fn all_dead_is_a_draw() {
        // Both deep outside a tiny zone on 1 health: the first zone damage
        // application kills them on the same tick
        let mut a = remote_at(50.0, 0.0);
        a.health = 1.0;
        let mut b = remote_at(55.0, 0.0);
        b.health = 1.0;

        let mut session = MatchSession::new(
            4,
            &ZoneConfig {
                initial_radius: 1.0,
                grace_secs: 600.0,
                ..ZoneConfig::default()
            },
            vec![a, b],
        );
        session.tick(tick_delta());
        assert_eq!(session.outcome(), Some(MatchOutcome::Draw));
    }

    #[test]
    fn session_freezes_after_outcome() {
        let solo = remote_at(0.0, 0.0);
        let mut session = MatchSession::new(5, &quiet_zone(), vec![solo]);
        session.tick(tick_delta());
        assert!(matches!(session.outcome(), Some(MatchOutcome::Winner(_))));

        let tick_before = session.tick_count();
        let radius_before = session.zone().radius();
        for _ in 0..50 {
            assert!(session.tick(tick_delta()).is_empty());
        }
        assert_eq!(session.tick_count(), tick_before);
        assert_eq!(session.zone().radius(), radius_before);
    }

    #[test]
    fn zone_damage_respects_the_cadence_and_hits_bots_and_humans_alike() {
        let mut rng = ChaCha8Rng::seed_from_u64(8);
        let human = remote_at(2000.0, 0.0);
        let human_id = human.id;
        let bot = Combatant::bot(
            Uuid::new_v4(),
            "Viper".into(),
            BotAgent::new(&mut rng),
            -2000.0,
            0.0,
            0.0,
        );
        let bot_id = bot.id;

        let mut session = MatchSession::new(
            6,
            &ZoneConfig {
                initial_radius: 100.0,
                grace_secs: 600.0,
                shrink_rate: 0.0,
                ..ZoneConfig::default()
            },
            vec![human, bot],
        );

        // One simulated second: with a 0.5 s cadence both take exactly two
        // damage applications (bots move slower than the gap to the edge)
        let mut human_hits = 0;
        let mut bot_hits = 0;
        for _ in 0..30 {
            for event in session.tick(tick_delta()) {
                if let GameEvent::ZoneDamage { player_id, .. } = event {
                    if player_id == human_id {
                        human_hits += 1;
                    } else if player_id == bot_id {
                        bot_hits += 1;
                    }
                }
            }
        }
        assert_eq!(human_hits, 2);
        assert_eq!(bot_hits, 2);
    }

    #[test]
    fn remote_position_is_trusted_but_death_is_one_way() {
        let a = remote_at(0.0, 0.0);
        let a_id = a.id;
        let b = remote_at(500.0, 0.0);

        let mut session = MatchSession::new(7, &quiet_zone(), vec![a, b]);

        // Implausible jump: accepted verbatim
        session.apply_remote_position(a_id, 4000.0, -4000.0, 1.0, 55.0, true);
        let a_ref = session.roster().iter().find(|c| c.id == a_id).unwrap();
        assert_eq!((a_ref.x, a_ref.y), (4000.0, -4000.0));
        assert_eq!(a_ref.health, 55.0);

        // Client-reported death
        session.apply_remote_death(a_id);
        assert!(!session.roster().iter().find(|c| c.id == a_id).unwrap().alive);

        // Resurrection attempt is ignored
        session.apply_remote_position(a_id, 0.0, 0.0, 0.0, 100.0, true);
        let a_ref = session.roster().iter().find(|c| c.id == a_id).unwrap();
        assert!(!a_ref.alive);
        assert_eq!(a_ref.health, 0.0);
    }

    #[test]
    fn removing_a_combatant_lets_the_field_resolve() {
        let a = remote_at(0.0, 0.0);
        let b = remote_at(500.0, 0.0);
        let b_id = b.id;
        let mut session = MatchSession::new(9, &quiet_zone(), vec![a, b]);

        session.remove_combatant(b_id);
        assert_eq!(session.roster().len(), 1);
        session.tick(tick_delta());
        assert!(matches!(session.outcome(), Some(MatchOutcome::Winner(_))));
    }

    #[test]
    fn stats_rank_survivors_first_then_by_death_time() {
        let a = remote_at(0.0, 0.0);
        let b = remote_at(100.0, 0.0);
        let c = remote_at(200.0, 0.0);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);

        let mut session = MatchSession::new(10, &quiet_zone(), vec![a, b, c]);
        session.tick(tick_delta());
        session.apply_remote_death(b_id);
        for _ in 0..60 {
            session.tick(tick_delta());
        }
        session.apply_remote_death(c_id);
        session.tick(tick_delta());

        let stats = session.build_stats();
        let order: Vec<Uuid> = stats.placements.iter().map(|p| p.player_id).collect();
        assert_eq!(order, vec![a_id, c_id, b_id]);
        assert_eq!(stats.placements[0].placement, 1);
        assert_eq!(stats.placements[2].placement, 3);
    }
}
