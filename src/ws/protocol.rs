//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Request room assignment
    #[serde(alias = "join_room")]
    Join {
        /// Display name (sanitized server-side)
        name: String,
        /// Opaque cosmetic reference, no gameplay effect
        #[serde(default)]
        cosmetic_ref: Option<String>,
        /// Lobby position, carried until spawn assignment
        #[serde(default)]
        x: f32,
        #[serde(default)]
        y: f32,
    },

    /// Best-effort state report, relayed verbatim to room peers
    Position {
        x: f32,
        y: f32,
        angle: f32,
        health: f32,
        alive: bool,
    },

    /// Shot report, relayed verbatim and mirrored into the simulation
    Shot {
        origin_x: f32,
        origin_y: f32,
        aim_x: f32,
        aim_y: f32,
        /// Cosmetic projectile tint
        #[serde(default)]
        color: Option<String>,
        /// Client timestamp
        t: u64,
    },

    /// Elimination notice (clients report their own deaths)
    Death { victim_id: Uuid },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Leave the current room
    Leave,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Handshake completion after a join request
    Init {
        player_id: Uuid,
        room_id: Uuid,
        /// Server wall clock for latency estimation
        server_time: u64,
        /// Milliseconds until the match starts
        time_left_ms: u64,
        /// Members already in the room (the joiner included)
        members: Vec<MemberInfo>,
    },

    /// Roster update: a member joined the room
    PlayerJoined { member: MemberInfo, occupancy: usize },

    /// Roster update: a member left the room
    PlayerLeft { player_id: Uuid, occupancy: usize },

    /// Countdown display update, once per second
    TimeUpdate { ms_remaining: u64 },

    /// Match begins: final roster (bots included) and assigned spawns
    GameStart {
        roster: Vec<MemberInfo>,
        spawns: Vec<SpawnPoint>,
    },

    /// Relayed state report from a room peer
    Position {
        player_id: Uuid,
        x: f32,
        y: f32,
        angle: f32,
        health: f32,
        alive: bool,
    },

    /// Relayed shot from a room peer
    Shot {
        player_id: Uuid,
        origin_x: f32,
        origin_y: f32,
        aim_x: f32,
        aim_y: f32,
        color: Option<String>,
        t: u64,
    },

    /// Relayed elimination notice
    Death { player_id: Uuid, victim_id: Uuid },

    /// Simulation state broadcast at regular intervals
    Snapshot {
        /// Server tick number
        tick: u64,
        zone: ZoneStatus,
        combatants: Vec<CombatantSnapshot>,
        projectiles: Vec<ProjectileSnapshot>,
        /// Events that occurred since the last snapshot
        events: Vec<GameEvent>,
    },

    /// Match has ended
    MatchEnd {
        winner_id: Option<Uuid>,
        stats: MatchStats,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },

    /// Error message
    Error { code: String, message: String },
}

/// Member descriptor for roster updates, carrying the last state the
/// relay saw so joiners can render the room immediately
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberInfo {
    pub player_id: Uuid,
    pub display_name: String,
    /// Opaque reference resolved by the cosmetic system client-side
    pub cosmetic_ref: Option<String>,
    pub is_bot: bool,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub alive: bool,
}

/// Spawn assignment broadcast with game_start
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnPoint {
    pub player_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub angle: f32,
}

/// Safe zone state as seen by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneStatus {
    pub center_x: f32,
    pub center_y: f32,
    pub radius: f32,
    /// Opening radius, for rendering the zone scale
    pub initial_radius: f32,
    /// Seconds until the zone starts shrinking (0 once shrinking)
    pub countdown: f32,
    pub shrinking: bool,
}

/// Combatant state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantSnapshot {
    pub player_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
    pub angle: f32,
    pub health: f32,
    pub ammo: u32,
    pub alive: bool,
    pub is_bot: bool,
}

/// Projectile state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileSnapshot {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub x: f32,
    pub y: f32,
    pub vel_x: f32,
    pub vel_y: f32,
}

/// Game events (shots, damage, kills)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GameEvent {
    /// Projectile fired by the simulation
    Shot {
        shooter_id: Uuid,
        projectile_id: Uuid,
        x: f32,
        y: f32,
        direction: f32,
    },

    /// Hit registered
    Hit {
        shooter_id: Uuid,
        target_id: Uuid,
        damage: f32,
        x: f32,
        y: f32,
    },

    /// Combatant killed
    Kill {
        killer_id: Option<Uuid>,
        victim_id: Uuid,
        /// "shot" or "zone"
        cause: String,
    },

    /// Zone damage applied
    ZoneDamage { player_id: Uuid, damage: f32 },
}

/// Match statistics at end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStats {
    pub duration_secs: u32,
    pub total_combatants: u32,
    pub placements: Vec<CombatantResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombatantResult {
    pub player_id: Uuid,
    pub display_name: String,
    pub is_bot: bool,
    pub kills: u32,
    pub score: u32,
    pub placement: u32,
    pub alive_time_secs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_accepts_both_wire_names() {
        let a: ClientMsg = serde_json::from_str(r#"{"type":"join","name":"Kat"}"#).unwrap();
        let b: ClientMsg = serde_json::from_str(r#"{"type":"join_room","name":"Kat"}"#).unwrap();
        assert!(matches!(a, ClientMsg::Join { ref name, .. } if name == "Kat"));
        assert!(matches!(b, ClientMsg::Join { ref name, .. } if name == "Kat"));
    }

    #[test]
    fn unknown_message_type_fails_to_parse() {
        let result: Result<ClientMsg, _> = serde_json::from_str(r#"{"type":"teleport","x":0}"#);
        assert!(result.is_err());
    }

    #[test]
    fn server_messages_carry_type_discriminator() {
        let msg = ServerMsg::TimeUpdate { ms_remaining: 12_000 };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"time_update""#));
    }
}
