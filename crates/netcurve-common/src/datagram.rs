// datagram.rs — packing serialized events into game datagrams
//
// A server-to-client datagram is `game_id(u32 BE)` followed by as many
// consecutive serialized event records as fit under the size cap.

use crate::event::{GameEvent, MIN_EVENT_RECORD};
use crate::wire::put_u32;

/// Hard cap on a UDP payload in this protocol.
pub const MAX_DATAGRAM_SIZE: usize = 512;

/// Greedily pack serialized events from `cache` starting at index `from`.
///
/// Returns the datagram and the index of the first event that did not fit.
/// A returned index equal to `from` means the very first record alone
/// exceeded the cap; no valid log contains such a record, so the caller
/// treats that as a logic error.
pub fn pack_from_cache(game_id: u32, cache: &[Vec<u8>], from: u32) -> (Vec<u8>, u32) {
    let mut buf = Vec::with_capacity(MAX_DATAGRAM_SIZE);
    put_u32(&mut buf, game_id);

    let mut next = from;
    while (next as usize) < cache.len()
        && buf.len() + cache[next as usize].len() <= MAX_DATAGRAM_SIZE
    {
        buf.extend_from_slice(&cache[next as usize]);
        next += 1;
    }

    (buf, next)
}

/// A received datagram, unpacked back into events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventBatch {
    pub game_id: u32,
    pub events: Vec<GameEvent>,
}

impl EventBatch {
    /// Unpack a datagram. Unknown-type records are skipped; a corrupt
    /// record ends parsing and the prefix parsed so far is kept. The
    /// datagram is accepted iff at least one event was parsed.
    pub fn deserialize(data: &[u8]) -> Option<EventBatch> {
        if data.len() < 4 {
            return None;
        }
        let game_id = u32::from_be_bytes(data[0..4].try_into().unwrap());

        let mut events = Vec::new();
        let mut offset = 4usize;
        while data.len() - offset >= MIN_EVENT_RECORD {
            let len =
                u32::from_be_bytes(data[offset..offset + 4].try_into().unwrap()) as usize;
            let Some(record_size) = len.checked_add(8) else {
                break;
            };
            if offset + record_size > data.len() {
                break; // truncated tail, keep the prefix
            }

            let record = &data[offset..offset + record_size];
            offset += record_size;

            match GameEvent::deserialize(record) {
                Ok(ev) => events.push(ev),
                Err(e) if e.is_skippable() => continue,
                Err(_) => break,
            }
        }

        (!events.is_empty()).then_some(EventBatch { game_id, events })
    }
}

// ============================================================
// Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Pixel};
    use crate::wire::put_u8;
    use crc::{Crc, CRC_32_ISO_HDLC};

    fn pixel(event_no: u32) -> GameEvent {
        GameEvent {
            event_no,
            kind: EventKind::Pixel(Pixel {
                player_no: (event_no % 2) as u8,
                x: event_no,
                y: event_no + 1,
            }),
        }
    }

    fn log_of_pixels(n: u32) -> Vec<Vec<u8>> {
        (0..n).map(|i| pixel(i).serialize()).collect()
    }

    // -------------------------------------------------------
    // Packing
    // -------------------------------------------------------

    #[test]
    fn pack_single_event() {
        let cache = log_of_pixels(1);
        let (buf, next) = pack_from_cache(0xaabbccdd, &cache, 0);
        assert_eq!(next, 1);
        assert_eq!(&buf[0..4], &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(&buf[4..], cache[0].as_slice());
    }

    #[test]
    fn pack_is_greedy_up_to_the_cap() {
        // a pixel record is 22 bytes; 4 + 23*22 = 510 fits, 24 do not
        let cache = log_of_pixels(40);
        let (buf, next) = pack_from_cache(1, &cache, 0);
        assert_eq!(next, 23);
        assert_eq!(buf.len(), 4 + 23 * 22);
        assert!(buf.len() <= MAX_DATAGRAM_SIZE);

        let (buf2, next2) = pack_from_cache(1, &cache, next);
        assert_eq!(next2, 40);
        assert!(buf2.len() <= MAX_DATAGRAM_SIZE);
    }

    #[test]
    fn pack_starts_mid_log() {
        let cache = log_of_pixels(5);
        let (buf, next) = pack_from_cache(1, &cache, 3);
        assert_eq!(next, 5);
        let batch = EventBatch::deserialize(&buf).unwrap();
        assert_eq!(batch.events, vec![pixel(3), pixel(4)]);
    }

    #[test]
    fn pack_past_the_end_is_empty() {
        let cache = log_of_pixels(2);
        let (buf, next) = pack_from_cache(1, &cache, 2);
        assert_eq!(next, 2);
        assert_eq!(buf.len(), 4);
        assert_eq!(EventBatch::deserialize(&buf), None);
    }

    #[test]
    fn pack_signals_no_progress_for_oversized_record() {
        let cache = vec![vec![0u8; MAX_DATAGRAM_SIZE]]; // could never fit next to game_id
        let (_, next) = pack_from_cache(1, &cache, 0);
        assert_eq!(next, 0);
    }

    // -------------------------------------------------------
    // Unpacking
    // -------------------------------------------------------

    #[test]
    fn pack_then_unpack_preserves_events() {
        let events: Vec<GameEvent> = (0..10).map(pixel).collect();
        let cache: Vec<Vec<u8>> = events.iter().map(|e| e.serialize()).collect();

        let mut got = Vec::new();
        let mut from = 0;
        while (from as usize) < cache.len() {
            let (buf, next) = pack_from_cache(7, &cache, from);
            assert!(buf.len() <= MAX_DATAGRAM_SIZE);
            let batch = EventBatch::deserialize(&buf).unwrap();
            assert_eq!(batch.game_id, 7);
            got.extend(batch.events);
            from = next;
        }
        assert_eq!(got, events);
    }

    #[test]
    fn unknown_event_type_is_skipped() {
        const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
        let mut unknown = Vec::new();
        put_u32(&mut unknown, 5);
        put_u32(&mut unknown, 1);
        put_u8(&mut unknown, 200);
        let crc = CRC.checksum(&unknown);
        put_u32(&mut unknown, crc);

        let mut data = Vec::new();
        put_u32(&mut data, 1);
        data.extend_from_slice(&pixel(0).serialize());
        data.extend_from_slice(&unknown);
        data.extend_from_slice(&pixel(2).serialize());

        let batch = EventBatch::deserialize(&data).unwrap();
        assert_eq!(batch.events, vec![pixel(0), pixel(2)]);
    }

    #[test]
    fn corrupt_record_keeps_parsed_prefix() {
        let mut data = Vec::new();
        put_u32(&mut data, 1);
        data.extend_from_slice(&pixel(0).serialize());
        let mut bad = pixel(1).serialize();
        bad[10] ^= 0xff;
        data.extend_from_slice(&bad);
        data.extend_from_slice(&pixel(2).serialize());

        let batch = EventBatch::deserialize(&data).unwrap();
        assert_eq!(batch.events, vec![pixel(0)]);
    }

    #[test]
    fn truncated_tail_keeps_parsed_prefix() {
        let mut data = Vec::new();
        put_u32(&mut data, 1);
        data.extend_from_slice(&pixel(0).serialize());
        let second = pixel(1).serialize();
        data.extend_from_slice(&second[..second.len() - 3]);

        let batch = EventBatch::deserialize(&data).unwrap();
        assert_eq!(batch.events, vec![pixel(0)]);
    }

    #[test]
    fn rejected_when_nothing_parses() {
        assert_eq!(EventBatch::deserialize(&[]), None);
        assert_eq!(EventBatch::deserialize(&[1, 2, 3]), None);
        assert_eq!(EventBatch::deserialize(&[0, 0, 0, 9]), None);
        let mut garbage = vec![0, 0, 0, 9];
        garbage.extend_from_slice(&[0xff; 40]);
        assert_eq!(EventBatch::deserialize(&garbage), None);
    }
}
