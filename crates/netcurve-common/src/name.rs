// name.rs — player name rule shared by heartbeats, NewGame payloads and CLIs

/// Maximum player name length in bytes.
pub const MAX_PLAYER_NAME_LEN: usize = 64;

/// A name is valid when it is at most 64 bytes and every byte is printable
/// non-space ASCII (33..=126). The empty name is valid: it is how a pure
/// observer identifies itself in heartbeats.
pub fn valid_player_name(name: &str) -> bool {
    name.len() <= MAX_PLAYER_NAME_LEN && name.bytes().all(|b| (33..=126).contains(&b))
}
