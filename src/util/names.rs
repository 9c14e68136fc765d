//! Display name handling for humans and bots

use rand::seq::SliceRandom;
use rand::Rng;

pub const MAX_NAME_LENGTH: usize = 20;

/// Collapse whitespace and bound the length of a client-supplied name.
pub fn sanitize_display_name(name: &str, fallback: &str) -> String {
    let cleaned = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        return fallback.to_string();
    }
    cleaned.chars().take(MAX_NAME_LENGTH).collect()
}

/// Names handed to bots so the roster reads like human players.
const BOT_NAMES: &[&str] = &[
    "Ace", "Blaze", "Bullet", "Cipher", "Dash", "Echo", "Falcon", "Ghost", "Havoc", "Jinx",
    "Krait", "Lynx", "Maverick", "Nomad", "Onyx", "Phantom", "Raptor", "Rogue", "Saber", "Shadow",
    "Talon", "Vandal", "Viper", "Wraith",
];

/// Pick a bot name, avoiding names already on the roster where possible.
pub fn bot_display_name<R: Rng>(rng: &mut R, taken: &[String]) -> String {
    let fresh: Vec<&&str> = BOT_NAMES
        .iter()
        .filter(|n| !taken.iter().any(|t| t == **n))
        .collect();

    match fresh.choose(rng) {
        Some(name) => name.to_string(),
        // Roster larger than the pool, fall back to a numbered name
        None => format!("{}{}", BOT_NAMES.choose(rng).unwrap_or(&"Rogue"), rng.gen_range(2..100)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn sanitize_collapses_whitespace_and_bounds_length() {
        assert_eq!(sanitize_display_name("  a   b  ", "x"), "a b");
        assert_eq!(sanitize_display_name("", "Player_1234"), "Player_1234");
        assert_eq!(sanitize_display_name("   ", "fallback"), "fallback");
        let long = "x".repeat(50);
        assert_eq!(sanitize_display_name(&long, "f").len(), MAX_NAME_LENGTH);
    }

    #[test]
    fn bot_names_avoid_taken_names() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let taken: Vec<String> = BOT_NAMES[..BOT_NAMES.len() - 1]
            .iter()
            .map(|s| s.to_string())
            .collect();
        for _ in 0..20 {
            let name = bot_display_name(&mut rng, &taken);
            assert!(!taken.contains(&name));
        }
    }
}
