// sv_send.rs — round-robin event delivery to connected peers

use std::net::UdpSocket;
use std::time::Instant;

use netcurve_common::datagram::pack_from_cache;
use tracing::error;

use crate::server::SessionRegistry;
use crate::sv_game::GameState;

/// Attempt at most one outbound datagram, starting at the round-robin
/// cursor. Walks past stale and caught-up sessions (at most one full lap),
/// so after `registry.len()` calls every session has had its turn.
/// UDP errors are ignored; an unacknowledged log is simply retried.
pub fn send_events_to_clients(
    socket: &UdpSocket,
    registry: &mut SessionRegistry,
    game: &GameState,
    now: Instant,
) {
    if game.tick_due(now) {
        return; // the simulation comes first
    }

    for _ in 0..registry.len() {
        if registry.is_empty() {
            return;
        }
        let idx = registry.cursor();

        if registry.get(idx).timed_out(now) {
            registry.disconnect(idx);
            continue;
        }

        {
            let session = registry.get_mut(idx);
            // a fresh game must reach the peer from its NewGame event
            if session.watching_game && !session.got_new_game_event {
                session.next_event_no = 0;
            }
        }

        let session = registry.get(idx);
        if !session.watching_game || session.next_event_no >= game.log.len() {
            registry.advance_cursor();
            continue;
        }
        let (from, addr) = (session.next_event_no, session.addr);

        let (packet, next) = pack_from_cache(game.game_id, game.log.records(), from);
        if next == from {
            error!(event_no = from, "event record does not fit a datagram");
            registry.advance_cursor();
            return;
        }

        if socket.send_to(&packet, addr).is_ok() {
            let session = registry.get_mut(idx);
            session.next_event_no = next;
            if from == 0 {
                session.got_new_game_event = true;
            }
        }

        registry.advance_cursor();
        return;
    }
}

// ============================================================
// Tests
// ============================================================
