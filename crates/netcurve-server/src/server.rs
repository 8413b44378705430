// server.rs — client sessions and the round-robin session registry

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use netcurve_common::heartbeat::HeartBeat;
use tracing::{debug, info};

/// Hard cap on concurrently connected peers.
pub const MAX_CLIENTS: usize = 42;

/// A session is evicted after this much heartbeat silence.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-peer connection state. A session is keyed by its peer address; a
/// changed session_id from the same address means the peer restarted.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub addr: SocketAddr,
    pub session_id: u64,
    pub name: String,
    /// Index into the current game's player list, -1 for an observer.
    pub player_no: i8,
    pub watching_game: bool,
    pub got_new_game_event: bool,
    pub ready_to_play: bool,
    pub last_heartbeat_time: Instant,
    pub next_event_no: u32,
}

impl ClientSession {
    pub fn timed_out(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_heartbeat_time) > CLIENT_TIMEOUT
    }
}

// ============================================================
// SessionRegistry
// ============================================================

/// Insertion-ordered session store plus the round-robin delivery cursor.
/// Order must stay stable across removals so the cursor walk is fair.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<ClientSession>,
    cursor: usize,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientSession> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ClientSession> {
        self.sessions.iter_mut()
    }

    pub fn get(&self, idx: usize) -> &ClientSession {
        &self.sessions[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut ClientSession {
        &mut self.sessions[idx]
    }

    pub fn find(&self, addr: SocketAddr) -> Option<usize> {
        self.sessions.iter().position(|s| s.addr == addr)
    }

    fn name_taken(&self, name: &str, excluding: Option<usize>) -> bool {
        self.sessions
            .iter()
            .enumerate()
            .any(|(i, s)| Some(i) != excluding && s.name == name)
    }

    // --------------------------------------------------------
    // Round-robin cursor
    // --------------------------------------------------------

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn advance_cursor(&mut self) {
        if !self.sessions.is_empty() {
            self.cursor = (self.cursor + 1) % self.sessions.len();
        }
    }

    /// Remove a session, keeping the cursor on what was the next candidate.
    pub fn disconnect(&mut self, idx: usize) {
        info!(name = %self.sessions[idx].name, addr = %self.sessions[idx].addr,
              "player disconnected");
        self.sessions.remove(idx);
        if idx < self.cursor {
            self.cursor -= 1;
        }
        if self.cursor >= self.sessions.len() {
            self.cursor = 0;
        }
    }

    /// Drop every session that has gone silent.
    pub fn sweep_timeouts(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.sessions.len() {
            if self.sessions[i].timed_out(now) {
                self.disconnect(i);
            } else {
                i += 1;
            }
        }
    }

    // --------------------------------------------------------
    // Admission
    // --------------------------------------------------------

    /// Apply one received heartbeat to the registry. Returns the index of
    /// the session it belongs to, or None when the datagram is dropped
    /// (registry full, name collision, or a stale/spoofed session id).
    pub fn admit(
        &mut self,
        addr: SocketAddr,
        hb: &HeartBeat,
        game_in_progress: bool,
        now: Instant,
    ) -> Option<usize> {
        let mut new_session = false;

        let idx = match self.find(addr) {
            None => {
                if self.sessions.len() >= MAX_CLIENTS {
                    debug!(name = %hb.player_name, %addr,
                           "rejecting player: maximum number of clients reached");
                    return None;
                }
                if self.name_taken(&hb.player_name, None) {
                    debug!(name = %hb.player_name, %addr,
                           "rejecting player: name already in use");
                    return None;
                }
                info!(name = %hb.player_name, %addr, "new player connected");
                new_session = true;
                self.sessions.push(ClientSession {
                    addr,
                    session_id: hb.session_id,
                    name: hb.player_name.clone(),
                    player_no: -1,
                    watching_game: false,
                    got_new_game_event: false,
                    ready_to_play: false,
                    last_heartbeat_time: now,
                    next_event_no: 0,
                });
                self.sessions.len() - 1
            }
            Some(idx) => {
                let same_session = self.sessions[idx].session_id == hb.session_id;
                let same_name = self.sessions[idx].name == hb.player_name;
                if !same_session {
                    if !same_name && self.name_taken(&hb.player_name, Some(idx)) {
                        self.disconnect(idx);
                        return None;
                    }
                    info!(old = %self.sessions[idx].name, new = %hb.player_name,
                          "player initialized a new session");
                    new_session = true;
                } else if !same_name {
                    return None; // stale or spoofed datagram
                }
                idx
            }
        };

        let session = &mut self.sessions[idx];
        if new_session {
            session.session_id = hb.session_id;
            session.name = hb.player_name.clone();
            session.player_no = -1;
            session.watching_game = game_in_progress;
            // a session joining mid-game is realigned by its own
            // next_expected_event_no rather than spammed from 0
            session.got_new_game_event = true;
            session.ready_to_play = false;
        }
        session.last_heartbeat_time = now;
        session.next_event_no = hb.next_expected_event_no;

        Some(idx)
    }
}

// ============================================================
// Tests
// ============================================================
