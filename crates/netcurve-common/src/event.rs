// event.rs — the game event record codec
//
// A serialized event is `len | event_no | type | payload | crc32`, every
// multi-byte integer big-endian. `len` counts event_no + type + payload;
// the CRC32 (IEEE/zlib polynomial) covers len through the end of payload.

use crc::{Crc, CRC_32_ISO_HDLC};
use thiserror::Error;

use crate::datagram::MAX_DATAGRAM_SIZE;
use crate::name::valid_player_name;
use crate::wire::{put_u32, put_u8, WireReader};

const EVENT_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Smallest possible record: len + event_no + type + crc32.
pub const MIN_EVENT_RECORD: usize = 4 + 4 + 1 + 4;

/// Bytes available for the name block of a NewGame payload, so that the
/// whole event still fits one datagram next to the game_id and the map
/// dimensions. Terminating nulls count against this.
pub const NAMES_CAPACITY: usize = MAX_DATAGRAM_SIZE - (4 + MIN_EVENT_RECORD + 8);

const TYPE_NEW_GAME: u8 = 0;
const TYPE_PIXEL: u8 = 1;
const TYPE_PLAYER_ELIMINATED: u8 = 2;
const TYPE_GAME_OVER: u8 = 3;

// ============================================================
// Event model
// ============================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameEvent {
    pub event_no: u32,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    NewGame(NewGame),
    Pixel(Pixel),
    PlayerEliminated(PlayerEliminated),
    GameOver,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGame {
    pub maxx: u32,
    pub maxy: u32,
    pub player_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pixel {
    pub player_no: u8,
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerEliminated {
    pub player_no: u8,
}

/// Wire length of a name block: each name plus its terminating null.
pub fn names_wire_len(names: &[String]) -> usize {
    names.iter().map(|n| n.len() + 1).sum()
}

// ============================================================
// Decode errors
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("event record shorter than the minimum envelope")]
    Truncated,
    #[error("event length field does not match the record size")]
    LengthMismatch,
    #[error("event checksum mismatch")]
    CrcMismatch,
    #[error("unrecognized event type {0}")]
    UnknownEventType(u8),
    #[error("event payload failed validation")]
    InvalidPayload,
}

impl DecodeError {
    /// Unknown-type records are skipped by the datagram unpacker; every
    /// other decode error poisons the rest of the datagram.
    pub fn is_skippable(&self) -> bool {
        matches!(self, DecodeError::UnknownEventType(_))
    }
}

// ============================================================
// Codec
// ============================================================

impl GameEvent {
    fn type_id(&self) -> u8 {
        match self.kind {
            EventKind::NewGame(_) => TYPE_NEW_GAME,
            EventKind::Pixel(_) => TYPE_PIXEL,
            EventKind::PlayerEliminated(_) => TYPE_PLAYER_ELIMINATED,
            EventKind::GameOver => TYPE_GAME_OVER,
        }
    }

    /// Structural validity of the payload. Range checks against the map and
    /// the player list are the receiving stream's job, not the codec's.
    pub fn validate(&self) -> bool {
        match &self.kind {
            EventKind::NewGame(ng) => {
                ng.player_names.len() >= 2
                    && names_wire_len(&ng.player_names) <= NAMES_CAPACITY
                    && ng
                        .player_names
                        .iter()
                        .all(|n| !n.is_empty() && valid_player_name(n))
            }
            EventKind::Pixel(_) | EventKind::PlayerEliminated(_) | EventKind::GameOver => true,
        }
    }

    /// Serialize into a fresh record. The event must be valid.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(MAX_DATAGRAM_SIZE);
        put_u32(&mut buf, 0); // len, patched below
        put_u32(&mut buf, self.event_no);
        put_u8(&mut buf, self.type_id());

        match &self.kind {
            EventKind::NewGame(ng) => {
                put_u32(&mut buf, ng.maxx);
                put_u32(&mut buf, ng.maxy);
                for name in &ng.player_names {
                    buf.extend_from_slice(name.as_bytes());
                    buf.push(0);
                }
            }
            EventKind::Pixel(px) => {
                put_u8(&mut buf, px.player_no);
                put_u32(&mut buf, px.x);
                put_u32(&mut buf, px.y);
            }
            EventKind::PlayerEliminated(pe) => {
                put_u8(&mut buf, pe.player_no);
            }
            EventKind::GameOver => {}
        }

        let len = (buf.len() - 4) as u32;
        buf[0..4].copy_from_slice(&len.to_be_bytes());
        let crc = EVENT_CRC.checksum(&buf);
        put_u32(&mut buf, crc);
        buf
    }

    /// Decode one record. The slice must span exactly one record; the
    /// datagram unpacker cuts records out by their length field.
    pub fn deserialize(record: &[u8]) -> Result<GameEvent, DecodeError> {
        if record.len() < MIN_EVENT_RECORD {
            return Err(DecodeError::Truncated);
        }
        if record.len() > MAX_DATAGRAM_SIZE {
            return Err(DecodeError::LengthMismatch);
        }

        let len = u32::from_be_bytes(record[0..4].try_into().unwrap()) as usize;
        if record.len() != len + 8 {
            return Err(DecodeError::LengthMismatch);
        }

        let crc_recvd = u32::from_be_bytes(record[4 + len..].try_into().unwrap());
        if EVENT_CRC.checksum(&record[..4 + len]) != crc_recvd {
            return Err(DecodeError::CrcMismatch);
        }

        let mut r = WireReader::new(&record[4..4 + len]);
        let event_no = r.read_u32().map_err(|_| DecodeError::Truncated)?;
        let type_id = r.read_u8().map_err(|_| DecodeError::Truncated)?;
        let payload = r.rest();

        let kind = match type_id {
            TYPE_NEW_GAME => EventKind::NewGame(decode_new_game(payload)?),
            TYPE_PIXEL => EventKind::Pixel(decode_pixel(payload)?),
            TYPE_PLAYER_ELIMINATED => EventKind::PlayerEliminated(decode_eliminated(payload)?),
            TYPE_GAME_OVER => {
                if !payload.is_empty() {
                    return Err(DecodeError::InvalidPayload);
                }
                EventKind::GameOver
            }
            other => return Err(DecodeError::UnknownEventType(other)),
        };

        let event = GameEvent { event_no, kind };
        if !event.validate() {
            return Err(DecodeError::InvalidPayload);
        }
        Ok(event)
    }
}

fn decode_new_game(payload: &[u8]) -> Result<NewGame, DecodeError> {
    let mut r = WireReader::new(payload);
    let maxx = r.read_u32().map_err(|_| DecodeError::InvalidPayload)?;
    let maxy = r.read_u32().map_err(|_| DecodeError::InvalidPayload)?;

    let mut player_names = Vec::new();
    let mut rest = r.rest();
    while !rest.is_empty() {
        // every name must carry its terminating null
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::InvalidPayload)?;
        let name =
            std::str::from_utf8(&rest[..nul]).map_err(|_| DecodeError::InvalidPayload)?;
        player_names.push(name.to_owned());
        rest = &rest[nul + 1..];
    }

    Ok(NewGame {
        maxx,
        maxy,
        player_names,
    })
}

fn decode_pixel(payload: &[u8]) -> Result<Pixel, DecodeError> {
    if payload.len() != 9 {
        return Err(DecodeError::InvalidPayload);
    }
    let mut r = WireReader::new(payload);
    Ok(Pixel {
        player_no: r.read_u8().map_err(|_| DecodeError::InvalidPayload)?,
        x: r.read_u32().map_err(|_| DecodeError::InvalidPayload)?,
        y: r.read_u32().map_err(|_| DecodeError::InvalidPayload)?,
    })
}

fn decode_eliminated(payload: &[u8]) -> Result<PlayerEliminated, DecodeError> {
    if payload.len() != 1 {
        return Err(DecodeError::InvalidPayload);
    }
    Ok(PlayerEliminated {
        player_no: payload[0],
    })
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn new_game(maxx: u32, maxy: u32, names: &[&str]) -> GameEvent {
        GameEvent {
            event_no: 0,
            kind: EventKind::NewGame(NewGame {
                maxx,
                maxy,
                player_names: names.iter().map(|s| s.to_string()).collect(),
            }),
        }
    }

    // -------------------------------------------------------
    // CRC polynomial pin
    // -------------------------------------------------------

    #[test]
    fn crc_matches_zlib_check_value() {
        // The standard check value for CRC-32/ISO-HDLC over "123456789".
        assert_eq!(EVENT_CRC.checksum(b"123456789"), 0xcbf43926);
    }

    // -------------------------------------------------------
    // Byte-exact layouts
    // -------------------------------------------------------

    #[test]
    fn game_over_layout() {
        let ev = GameEvent {
            event_no: 7,
            kind: EventKind::GameOver,
        };
        assert_eq!(
            ev.serialize(),
            [0, 0, 0, 5, 0, 0, 0, 7, 3, 0x60, 0x8c, 0x42, 0x60]
        );
    }

    #[test]
    fn pixel_layout() {
        let ev = GameEvent {
            event_no: 1,
            kind: EventKind::Pixel(Pixel {
                player_no: 2,
                x: 10,
                y: 20,
            }),
        };
        assert_eq!(
            ev.serialize(),
            [0, 0, 0, 14, 0, 0, 0, 1, 1, 2, 0, 0, 0, 10, 0, 0, 0, 20, 0xda, 0xb8, 0x87, 0x9c]
        );
    }

    #[test]
    fn new_game_layout() {
        let ev = new_game(100, 200, &["a", "bob"]);
        assert_eq!(
            ev.serialize(),
            [
                0, 0, 0, 19, 0, 0, 0, 0, 0, 0, 0, 0, 100, 0, 0, 0, 200, b'a', 0, b'b', b'o',
                b'b', 0, 0x64, 0xf7, 0x90, 0xb2
            ]
        );
    }

    // -------------------------------------------------------
    // Round trips
    // -------------------------------------------------------

    #[test]
    fn round_trip_all_variants() {
        let events = [
            new_game(800, 600, &["alice", "bob", "carol"]),
            GameEvent {
                event_no: 12,
                kind: EventKind::Pixel(Pixel {
                    player_no: 1,
                    x: 799,
                    y: 0,
                }),
            },
            GameEvent {
                event_no: 13,
                kind: EventKind::PlayerEliminated(PlayerEliminated { player_no: 0 }),
            },
            GameEvent {
                event_no: 14,
                kind: EventKind::GameOver,
            },
        ];
        for ev in events {
            let bytes = ev.serialize();
            assert_eq!(GameEvent::deserialize(&bytes), Ok(ev));
        }
    }

    // -------------------------------------------------------
    // Corruption
    // -------------------------------------------------------

    #[test]
    fn flipped_byte_is_rejected() {
        let bytes = new_game(10, 10, &["aa", "bb"]).serialize();
        for i in 0..bytes.len() {
            let mut bad = bytes.clone();
            bad[i] ^= 0x5a;
            assert!(
                GameEvent::deserialize(&bad).is_err(),
                "byte {} flip accepted",
                i
            );
        }
    }

    #[test]
    fn truncation_is_rejected() {
        let bytes = GameEvent {
            event_no: 3,
            kind: EventKind::PlayerEliminated(PlayerEliminated { player_no: 1 }),
        }
        .serialize();
        for cut in 1..=bytes.len() {
            let short = &bytes[..bytes.len() - cut];
            assert!(GameEvent::deserialize(short).is_err());
        }
    }

    #[test]
    fn bad_crc_reported_as_mismatch() {
        let mut bytes = GameEvent {
            event_no: 3,
            kind: EventKind::GameOver,
        }
        .serialize();
        let last = bytes.len() - 1;
        bytes[last] ^= 1;
        assert_eq!(
            GameEvent::deserialize(&bytes),
            Err(DecodeError::CrcMismatch)
        );
    }

    // -------------------------------------------------------
    // Unknown types
    // -------------------------------------------------------

    #[test]
    fn unknown_type_with_good_crc_is_skippable() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 5);
        put_u32(&mut buf, 9);
        put_u8(&mut buf, 77);
        let crc = EVENT_CRC.checksum(&buf);
        put_u32(&mut buf, crc);

        let err = GameEvent::deserialize(&buf).unwrap_err();
        assert_eq!(err, DecodeError::UnknownEventType(77));
        assert!(err.is_skippable());
    }

    #[test]
    fn unknown_type_with_bad_crc_is_fatal() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 5);
        put_u32(&mut buf, 9);
        put_u8(&mut buf, 77);
        put_u32(&mut buf, 0xdeadbeef);

        let err = GameEvent::deserialize(&buf).unwrap_err();
        assert_eq!(err, DecodeError::CrcMismatch);
        assert!(!err.is_skippable());
    }

    // -------------------------------------------------------
    // Payload validation
    // -------------------------------------------------------

    #[test]
    fn new_game_needs_two_players() {
        let bytes = new_game(10, 10, &["solo"]).serialize();
        assert_eq!(
            GameEvent::deserialize(&bytes),
            Err(DecodeError::InvalidPayload)
        );
    }

    #[test]
    fn new_game_rejects_bad_name() {
        let bytes = new_game(10, 10, &["ok", "has space"]).serialize();
        assert_eq!(
            GameEvent::deserialize(&bytes),
            Err(DecodeError::InvalidPayload)
        );
    }

    #[test]
    fn new_game_rejects_unterminated_name_block() {
        let ev = new_game(10, 10, &["aa", "bb"]);
        let mut buf = Vec::new();
        put_u32(&mut buf, 0);
        put_u32(&mut buf, 0);
        put_u8(&mut buf, 0);
        put_u32(&mut buf, 10);
        put_u32(&mut buf, 10);
        buf.extend_from_slice(b"aa\0bb"); // final null missing
        let len = (buf.len() - 4) as u32;
        buf[0..4].copy_from_slice(&len.to_be_bytes());
        let crc = EVENT_CRC.checksum(&buf);
        put_u32(&mut buf, crc);

        assert_eq!(
            GameEvent::deserialize(&buf),
            Err(DecodeError::InvalidPayload)
        );
        // sanity: the properly terminated form decodes
        assert!(GameEvent::deserialize(&ev.serialize()).is_ok());
    }

    #[test]
    fn pixel_payload_must_be_nine_bytes() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 4 + 1 + 8);
        put_u32(&mut buf, 1);
        put_u8(&mut buf, TYPE_PIXEL);
        buf.extend_from_slice(&[0; 8]); // one byte short of a pixel
        let crc = EVENT_CRC.checksum(&buf);
        put_u32(&mut buf, crc);

        assert_eq!(
            GameEvent::deserialize(&buf),
            Err(DecodeError::InvalidPayload)
        );
    }

    #[test]
    fn names_capacity_is_enforced() {
        // 8 names of 64 bytes = 520 bytes with nulls, over the 487 capacity
        let long: Vec<String> = (0..8).map(|i| format!("{:0>64}", i)).collect();
        let ev = GameEvent {
            event_no: 0,
            kind: EventKind::NewGame(NewGame {
                maxx: 1,
                maxy: 1,
                player_names: long,
            }),
        };
        assert!(!ev.validate());
    }

    // -------------------------------------------------------
    // Properties
    // -------------------------------------------------------

    fn arb_name() -> impl Strategy<Value = String> {
        proptest::collection::vec(33u8..=126, 1..=16)
            .prop_map(|bytes| String::from_utf8(bytes).unwrap())
    }

    fn arb_event() -> impl Strategy<Value = GameEvent> {
        let new_game = (
            any::<u32>(),
            any::<u32>(),
            proptest::collection::vec(arb_name(), 2..=6),
        )
            .prop_map(|(maxx, maxy, player_names)| {
                EventKind::NewGame(NewGame {
                    maxx,
                    maxy,
                    player_names,
                })
            });
        let pixel = (any::<u8>(), any::<u32>(), any::<u32>())
            .prop_map(|(player_no, x, y)| EventKind::Pixel(Pixel { player_no, x, y }));
        let eliminated = any::<u8>()
            .prop_map(|player_no| EventKind::PlayerEliminated(PlayerEliminated { player_no }));
        let kind = prop_oneof![new_game, pixel, eliminated, Just(EventKind::GameOver)];
        (any::<u32>(), kind).prop_map(|(event_no, kind)| GameEvent { event_no, kind })
    }

    proptest! {
        #[test]
        fn prop_round_trip(ev in arb_event()) {
            let bytes = ev.serialize();
            prop_assert!(bytes.len() <= MAX_DATAGRAM_SIZE - 4);
            prop_assert_eq!(GameEvent::deserialize(&bytes), Ok(ev));
        }

        #[test]
        fn prop_single_byte_mutation_rejected(ev in arb_event(), pos in any::<prop::sample::Index>(), mask in 1u8..=255) {
            let mut bytes = ev.serialize();
            let i = pos.index(bytes.len());
            bytes[i] ^= mask;
            prop_assert!(GameEvent::deserialize(&bytes).is_err());
        }
    }
}
