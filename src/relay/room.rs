//! Room actor: pre-match countdown, bare message relay, and the match tick loop
//!
//! Each room runs as its own task. All room state lives inside the task, so
//! no two ticks of one room ever overlap and teardown is just the task
//! returning: the ticker, mailbox, and member channels drop with it, and no
//! timer can fire against released state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::bot::BotAgent;
use crate::game::combatant::Combatant;
use crate::game::session::{MatchOutcome, MatchSession};
use crate::game::snapshot::SnapshotBuilder;
use crate::game::zone::ZoneConfig;
use crate::store::{MatchResult, ScoreStore};
use crate::util::names::bot_display_name;
use crate::util::time::{tick_delta, SIMULATION_TPS, SNAPSHOT_TPS, TICK_DURATION_MICROS};
use crate::ws::protocol::{ClientMsg, MemberInfo, ServerMsg, SpawnPoint};

/// Join-time member descriptor supplied by the connection handler
#[derive(Debug, Clone)]
pub struct MemberProfile {
    pub display_name: String,
    pub cosmetic_ref: Option<String>,
    pub x: f32,
    pub y: f32,
}

/// Reply to a successful room assignment
#[derive(Debug)]
pub struct RoomAssignment {
    pub room_id: Uuid,
    pub time_left_ms: u64,
    pub members: Vec<MemberInfo>,
}

/// Commands delivered to a room's mailbox
pub enum RoomInput {
    Join {
        player_id: Uuid,
        profile: MemberProfile,
        tx: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<RoomAssignment>,
    },
    Client {
        player_id: Uuid,
        msg: ClientMsg,
    },
    Leave {
        player_id: Uuid,
    },
}

/// A connected room member. `last_known` mirrors whatever the client last
/// reported; the relay never second-guesses it.
struct Member {
    player_id: Uuid,
    display_name: String,
    cosmetic_ref: Option<String>,
    tx: mpsc::Sender<ServerMsg>,
    last_known: (f32, f32, f32),
    health: f32,
    alive: bool,
}

impl Member {
    fn info(&self) -> MemberInfo {
        MemberInfo {
            player_id: self.player_id,
            display_name: self.display_name.clone(),
            cosmetic_ref: self.cosmetic_ref.clone(),
            is_bot: false,
            x: self.last_known.0,
            y: self.last_known.1,
            health: self.health,
            alive: self.alive,
        }
    }
}

/// Shared handle kept in the manager's registry
#[derive(Clone)]
pub struct RoomHandle {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub input_tx: mpsc::Sender<RoomInput>,
    pub occupancy: Arc<AtomicUsize>,
    pub started: Arc<AtomicBool>,
}

/// One room and, once started, its match
pub struct Room {
    id: Uuid,
    capacity: usize,

    countdown_left_ms: f32,
    last_announced_secs: u64,

    members: HashMap<Uuid, Member>,
    join_order: Vec<Uuid>,
    /// Set on the first join; a room only tears down for emptiness after
    /// its opening member has actually been delivered
    ever_joined: bool,
    started: bool,

    session: Option<MatchSession>,
    snapshots: SnapshotBuilder,

    input_rx: mpsc::Receiver<RoomInput>,
    occupancy: Arc<AtomicUsize>,
    started_flag: Arc<AtomicBool>,

    seed: u64,
    rng: ChaCha8Rng,
    zone_config: ZoneConfig,
    score_store: Arc<dyn ScoreStore>,
}

impl Room {
    pub fn new(
        id: Uuid,
        capacity: usize,
        countdown_ms: u64,
        seed: u64,
        score_store: Arc<dyn ScoreStore>,
    ) -> (Self, RoomHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let occupancy = Arc::new(AtomicUsize::new(0));
        let started = Arc::new(AtomicBool::new(false));
        let created_at = Utc::now();

        let handle = RoomHandle {
            id,
            created_at,
            input_tx,
            occupancy: occupancy.clone(),
            started: started.clone(),
        };

        let room = Self {
            id,
            capacity,
            countdown_left_ms: countdown_ms as f32,
            last_announced_secs: u64::MAX,
            members: HashMap::new(),
            join_order: Vec::new(),
            ever_joined: false,
            started: false,
            session: None,
            snapshots: SnapshotBuilder::new(SIMULATION_TPS / SNAPSHOT_TPS.max(1)),
            input_rx,
            occupancy,
            started_flag: started,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            zone_config: ZoneConfig::default(),
            score_store,
        };

        (room, handle)
    }

    /// Run the room to completion: countdown, match, teardown
    pub async fn run(mut self) {
        info!(room_id = %self.id, capacity = self.capacity, "Room opened");

        let tick_duration = Duration::from_micros(TICK_DURATION_MICROS);
        let mut ticker = interval(tick_duration);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            self.process_inputs();

            let dt = tick_delta();
            if !self.started {
                self.tick_countdown(dt);
            } else if self.tick_match(dt) {
                break;
            }

            if self.ever_joined && self.occupancy.load(Ordering::SeqCst) == 0 {
                info!(room_id = %self.id, "Room emptied");
                break;
            }
        }

        info!(room_id = %self.id, "Room closed");
    }

    /// Drain the mailbox. Inputs are handled in arrival order, which
    /// preserves per-sender ordering; there is no cross-sender guarantee.
    fn process_inputs(&mut self) {
        while let Ok(input) = self.input_rx.try_recv() {
            match input {
                RoomInput::Join {
                    player_id,
                    profile,
                    tx,
                    reply,
                } => self.handle_join(player_id, profile, tx, reply),
                RoomInput::Client { player_id, msg } => self.handle_client(player_id, msg),
                RoomInput::Leave { player_id } => self.handle_leave(player_id),
            }
        }
    }

    fn handle_join(
        &mut self,
        player_id: Uuid,
        profile: MemberProfile,
        tx: mpsc::Sender<ServerMsg>,
        reply: oneshot::Sender<RoomAssignment>,
    ) {
        let member = Member {
            player_id,
            display_name: profile.display_name,
            cosmetic_ref: profile.cosmetic_ref,
            tx,
            last_known: (profile.x, profile.y, 0.0),
            health: crate::game::combatant::MAX_HEALTH,
            alive: true,
        };
        let info = member.info();

        self.members.insert(player_id, member);
        self.join_order.push(player_id);
        self.ever_joined = true;

        info!(
            room_id = %self.id,
            player_id = %player_id,
            occupancy = self.members.len(),
            "Player joined room"
        );

        let _ = reply.send(RoomAssignment {
            room_id: self.id,
            time_left_ms: if self.started {
                0
            } else {
                self.countdown_left_ms.max(0.0) as u64
            },
            members: self.member_infos(),
        });

        self.broadcast_except(
            player_id,
            ServerMsg::PlayerJoined {
                member: info,
                occupancy: self.members.len(),
            },
        );

        // A reserved slot is always honored: if the deadline fired between
        // assignment and delivery, the member enters the running match late.
        if self.started {
            self.admit_late_joiner(player_id);
        }
    }

    /// Drop a member into an already-started match at a fresh spawn
    fn admit_late_joiner(&mut self, player_id: Uuid) {
        let Some(session) = &mut self.session else {
            return;
        };
        let Some(member) = self.members.get(&player_id) else {
            return;
        };

        let (x, y, angle) = spawn_position(&mut self.rng, self.zone_config.initial_radius);
        let combatant = Combatant::remote(
            player_id,
            member.display_name.clone(),
            member.cosmetic_ref.clone(),
            x,
            y,
            angle,
        );
        session.add_combatant(combatant);

        let roster = self.roster_infos();
        let spawns = vec![SpawnPoint {
            player_id,
            x,
            y,
            angle,
        }];
        self.send_to(player_id, ServerMsg::GameStart { roster, spawns });
    }

    fn handle_client(&mut self, player_id: Uuid, msg: ClientMsg) {
        match msg {
            ClientMsg::Position {
                x,
                y,
                angle,
                health,
                alive,
            } => {
                if let Some(member) = self.members.get_mut(&player_id) {
                    member.last_known = (x, y, angle);
                    member.health = health;
                    // The mirror obeys the same one-way rule as the simulation
                    member.alive = member.alive && alive;
                }
                if let Some(session) = &mut self.session {
                    session.apply_remote_position(player_id, x, y, angle, health, alive);
                }
                self.broadcast_except(
                    player_id,
                    ServerMsg::Position {
                        player_id,
                        x,
                        y,
                        angle,
                        health,
                        alive,
                    },
                );
            }

            ClientMsg::Shot {
                origin_x,
                origin_y,
                aim_x,
                aim_y,
                color,
                t,
            } => {
                if let Some(session) = &mut self.session {
                    // Mirrored into the simulation under the usual fire
                    // gates; the raw message is relayed either way.
                    session.apply_remote_shot(player_id, origin_x, origin_y, aim_x, aim_y);
                }
                self.broadcast_except(
                    player_id,
                    ServerMsg::Shot {
                        player_id,
                        origin_x,
                        origin_y,
                        aim_x,
                        aim_y,
                        color,
                        t,
                    },
                );
            }

            ClientMsg::Death { victim_id } => {
                if let Some(member) = self.members.get_mut(&victim_id) {
                    member.alive = false;
                    member.health = 0.0;
                }
                if let Some(session) = &mut self.session {
                    session.apply_remote_death(victim_id);
                }
                self.broadcast_except(player_id, ServerMsg::Death { player_id, victim_id });
            }

            // Handled at the connection layer; nothing to relay
            other => {
                debug!(room_id = %self.id, player_id = %player_id, ?other, "Unexpected room message");
            }
        }
    }

    fn handle_leave(&mut self, player_id: Uuid) {
        if self.members.remove(&player_id).is_none() {
            return;
        }
        self.join_order.retain(|id| *id != player_id);
        self.occupancy.fetch_sub(1, Ordering::SeqCst);

        info!(
            room_id = %self.id,
            player_id = %player_id,
            occupancy = self.members.len(),
            "Player left room"
        );

        if let Some(session) = &mut self.session {
            session.remove_combatant(player_id);
        }

        self.broadcast_except(
            player_id,
            ServerMsg::PlayerLeft {
                player_id,
                occupancy: self.members.len(),
            },
        );
    }

    /// Countdown phase: announce remaining time once per second and start
    /// at the deadline. The deadline is hard: a room that never fills still
    /// starts, with bots taking the open slots. Filling to capacity starts
    /// the match early.
    fn tick_countdown(&mut self, dt: f32) {
        self.countdown_left_ms -= dt * 1000.0;
        let remaining_ms = self.countdown_left_ms.max(0.0) as u64;

        let whole_secs = remaining_ms / 1000;
        if whole_secs != self.last_announced_secs {
            self.last_announced_secs = whole_secs;
            self.broadcast_all(ServerMsg::TimeUpdate {
                ms_remaining: remaining_ms,
            });
        }

        if self.countdown_left_ms <= 0.0 || self.members.len() >= self.capacity {
            self.start_match();
        }
    }

    fn start_match(&mut self) {
        self.started = true;
        self.started_flag.store(true, Ordering::SeqCst);

        let mut roster: Vec<Combatant> = Vec::with_capacity(self.capacity);
        let mut spawns: Vec<SpawnPoint> = Vec::new();

        for player_id in &self.join_order {
            let Some(member) = self.members.get(player_id) else {
                continue;
            };
            let (x, y, angle) = spawn_position(&mut self.rng, self.zone_config.initial_radius);
            spawns.push(SpawnPoint {
                player_id: *player_id,
                x,
                y,
                angle,
            });
            roster.push(Combatant::remote(
                *player_id,
                member.display_name.clone(),
                member.cosmetic_ref.clone(),
                x,
                y,
                angle,
            ));
        }

        // Bots fill whatever the countdown deadline left open
        let mut taken: Vec<String> = roster.iter().map(|c| c.display_name.clone()).collect();
        while roster.len() < self.capacity {
            let bot_id = Uuid::new_v4();
            let name = bot_display_name(&mut self.rng, &taken);
            taken.push(name.clone());
            let agent = BotAgent::new(&mut self.rng);
            let (x, y, angle) = spawn_position(&mut self.rng, self.zone_config.initial_radius);
            spawns.push(SpawnPoint {
                player_id: bot_id,
                x,
                y,
                angle,
            });
            roster.push(Combatant::bot(bot_id, name, agent, x, y, angle));
        }

        let bot_count = roster.iter().filter(|c| c.is_bot()).count();
        info!(
            room_id = %self.id,
            humans = self.members.len(),
            bots = bot_count,
            "Match starting"
        );

        let roster_infos: Vec<MemberInfo> = roster.iter().map(combatant_info).collect();

        self.session = Some(MatchSession::new(self.seed, &self.zone_config, roster));

        self.broadcast_all(ServerMsg::GameStart {
            roster: roster_infos,
            spawns,
        });
    }

    /// One match tick. Returns true when the match has resolved and the
    /// room should tear down.
    fn tick_match(&mut self, dt: f32) -> bool {
        let (events, outcome) = match &mut self.session {
            Some(session) => (session.tick(dt), session.outcome()),
            None => return false,
        };

        if outcome.is_some() {
            self.snapshots.force_next();
        }
        if self.snapshots.should_send() {
            if let Some(session) = &self.session {
                let msg = self.snapshots.build(
                    session.tick_count(),
                    session.zone().status(),
                    session.roster(),
                    session.projectiles(),
                    events,
                );
                self.broadcast_all(msg);
            }
        }

        match outcome {
            Some(outcome) => {
                self.finish_match(outcome);
                true
            }
            None => false,
        }
    }

    fn finish_match(&mut self, outcome: MatchOutcome) {
        let Some(session) = &self.session else {
            return;
        };
        let stats = session.build_stats();
        let winner_id = match outcome {
            MatchOutcome::Winner(id) => Some(id),
            MatchOutcome::Draw => None,
        };

        info!(room_id = %self.id, winner = ?winner_id, "Match ended");

        // Hand the final scores to the persistence boundary exactly once
        let result = MatchResult::from_stats(self.id, winner_id, &stats);
        let store = self.score_store.clone();
        let room_id = self.id;
        tokio::task::spawn_blocking(move || {
            if let Err(e) = store.record_match(&result) {
                warn!(room_id = %room_id, error = %e, "Failed to record match result");
            }
        });

        self.broadcast_all(ServerMsg::MatchEnd { winner_id, stats });
    }

    fn member_infos(&self) -> Vec<MemberInfo> {
        self.join_order
            .iter()
            .filter_map(|id| self.members.get(id))
            .map(Member::info)
            .collect()
    }

    /// Full roster (bots included) once a match is running
    fn roster_infos(&self) -> Vec<MemberInfo> {
        match &self.session {
            Some(session) => session.roster().iter().map(combatant_info).collect(),
            None => self.member_infos(),
        }
    }

    /// Best-effort delivery: a full or closed member channel drops the
    /// message rather than stalling the tick loop.
    fn send_to(&self, player_id: Uuid, msg: ServerMsg) {
        if let Some(member) = self.members.get(&player_id) {
            if member.tx.try_send(msg).is_err() {
                debug!(room_id = %self.id, player_id = %player_id, "Dropped message to slow member");
            }
        }
    }

    fn broadcast_all(&self, msg: ServerMsg) {
        for member in self.members.values() {
            if member.tx.try_send(msg.clone()).is_err() {
                debug!(room_id = %self.id, player_id = %member.player_id, "Dropped broadcast to slow member");
            }
        }
    }

    fn broadcast_except(&self, except: Uuid, msg: ServerMsg) {
        for member in self.members.values() {
            if member.player_id == except {
                continue;
            }
            if member.tx.try_send(msg.clone()).is_err() {
                debug!(room_id = %self.id, player_id = %member.player_id, "Dropped relay to slow member");
            }
        }
    }
}

fn combatant_info(c: &Combatant) -> MemberInfo {
    MemberInfo {
        player_id: c.id,
        display_name: c.display_name.clone(),
        cosmetic_ref: c.cosmetic_ref.clone(),
        is_bot: c.is_bot(),
        x: c.x,
        y: c.y,
        health: c.health,
        alive: c.alive,
    }
}

/// Random spawn on a ring inside the opening zone
fn spawn_position(rng: &mut ChaCha8Rng, zone_radius: f32) -> (f32, f32, f32) {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let distance = rng.gen_range(200.0..zone_radius * 0.8);
    let x = angle.cos() * distance;
    let y = angle.sin() * distance;
    let facing = rng.gen_range(0.0..std::f32::consts::TAU);
    (x, y, facing)
}
