// heartbeat.rs — the client-to-server keepalive / input datagram
//
// Fixed layout: session_id(u64) | turn_direction(i8) | next_expected_event_no(u32)
// followed by the player name; the name length is whatever the datagram
// length says it is. Big-endian throughout.

use crate::name::{valid_player_name, MAX_PLAYER_NAME_LEN};
use crate::wire::{put_i8, put_u32, put_u64, WireReader};

/// session_id + turn_direction + next_expected_event_no.
pub const HEARTBEAT_HEADER_LEN: usize = 8 + 1 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartBeat {
    pub session_id: u64,
    pub turn_direction: i8,
    pub next_expected_event_no: u32,
    pub player_name: String,
}

impl HeartBeat {
    pub fn validate(&self) -> bool {
        (-1..=1).contains(&self.turn_direction) && valid_player_name(&self.player_name)
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEARTBEAT_HEADER_LEN + self.player_name.len());
        put_u64(&mut buf, self.session_id);
        put_i8(&mut buf, self.turn_direction);
        put_u32(&mut buf, self.next_expected_event_no);
        buf.extend_from_slice(self.player_name.as_bytes());
        buf
    }

    /// Parse one datagram; anything malformed is simply not a heartbeat.
    pub fn deserialize(data: &[u8]) -> Option<HeartBeat> {
        if data.len() < HEARTBEAT_HEADER_LEN
            || data.len() > HEARTBEAT_HEADER_LEN + MAX_PLAYER_NAME_LEN
        {
            return None;
        }

        let mut r = WireReader::new(data);
        let hb = HeartBeat {
            session_id: r.read_u64().ok()?,
            turn_direction: r.read_i8().ok()?,
            next_expected_event_no: r.read_u32().ok()?,
            player_name: std::str::from_utf8(r.rest()).ok()?.to_owned(),
        };
        hb.validate().then_some(hb)
    }
}

// ============================================================
// Tests
// ============================================================
