// cl_parse.rs — ordered reassembly and validation of the server event stream
//
// Events arrive in datagrams that may be lost, duplicated or reordered. The
// tracker buffers them in a slot per event_no, processes them strictly in
// order, and hands processed events to the GUI bridge. Anything the server
// sends that contradicts the stream invariants is fatal: the server is
// authoritative, so a contradiction means the session is unrecoverable.

use std::collections::HashSet;

use netcurve_common::datagram::EventBatch;
use netcurve_common::event::{EventKind, GameEvent};
use thiserror::Error;
use tracing::info;

/// How far past the next expected event a received event may run before the
/// whole datagram is dropped.
pub const LOOK_AHEAD_WINDOW: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("received events with inconsistent sequence numbers")]
    InconsistentBatch,
    #[error("first event of a game is not NewGame")]
    FirstEventNotNewGame,
    #[error("NewGame event at a nonzero position")]
    MidGameNewGame,
    #[error("event received after game over")]
    EventAfterGameOver,
    #[error("player index out of range")]
    PlayerIndexOutOfRange,
    #[error("pixel outside the map")]
    PixelOutsideMap,
}

/// Receive-side replica of one game's event log.
#[derive(Debug, Default)]
pub struct EventTracker {
    game_id: u32,
    prev_game_ids: HashSet<u32>,
    maxx: u32,
    maxy: u32,
    player_names: Vec<String>,
    events: Vec<Option<GameEvent>>,
    next_event_no: u32,
    gui_next_event_no: u32,
    game_over: bool,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next event number to acknowledge in heartbeats.
    pub fn next_event_no(&self) -> u32 {
        self.next_event_no
    }

    pub fn player_names(&self) -> &[String] {
        &self.player_names
    }

    /// File a received datagram into the slot buffer.
    pub fn accept_batch(&mut self, batch: EventBatch) -> Result<(), StreamError> {
        if self.prev_game_ids.contains(&batch.game_id) {
            return Ok(()); // straggler from a finished game
        }
        let Some(first) = batch.events.first() else {
            return Ok(());
        };

        let first_no = first.event_no;
        for (i, ev) in batch.events.iter().enumerate() {
            match first_no.checked_add(i as u32) {
                Some(expected) if ev.event_no == expected => {}
                _ => return Err(StreamError::InconsistentBatch),
            }
        }

        if batch.game_id != self.game_id {
            self.switch_game(batch.game_id);
        }

        let lo = first_no;
        let hi = first_no + (batch.events.len() - 1) as u32;
        if hi < self.next_event_no
            || lo > self.next_event_no.saturating_add(LOOK_AHEAD_WINDOW)
        {
            return Ok(()); // entirely behind us, or too far ahead to hold
        }

        if self.events.len() <= hi as usize {
            self.events.resize(hi as usize + 1, None);
        }
        for ev in batch.events {
            let slot = &mut self.events[ev.event_no as usize];
            // slots are write-once; replays and overlaps are no-ops
            if slot.is_none() {
                *slot = Some(ev);
            }
        }
        Ok(())
    }

    fn switch_game(&mut self, new_game_id: u32) {
        info!(old = self.game_id, new = new_game_id, "entering new game");
        self.prev_game_ids.insert(self.game_id);
        self.game_id = new_game_id;
        self.maxx = 0;
        self.maxy = 0;
        self.player_names.clear();
        self.events.clear();
        self.next_event_no = 0;
        self.gui_next_event_no = 0;
        self.game_over = false;
    }

    pub fn has_processable(&self) -> bool {
        matches!(
            self.events.get(self.next_event_no as usize),
            Some(Some(_))
        )
    }

    /// Validate and apply the next buffered event, if present. Returns
    /// whether an event was processed.
    pub fn process_next(&mut self) -> Result<bool, StreamError> {
        let Some(Some(event)) = self.events.get(self.next_event_no as usize) else {
            return Ok(false);
        };

        let is_new_game = matches!(event.kind, EventKind::NewGame(_));
        if event.event_no == 0 && !is_new_game {
            return Err(StreamError::FirstEventNotNewGame);
        }
        if event.event_no > 0 && is_new_game {
            return Err(StreamError::MidGameNewGame);
        }
        if self.game_over {
            return Err(StreamError::EventAfterGameOver);
        }

        match &event.kind {
            EventKind::NewGame(ng) => {
                let (maxx, maxy, names) = (ng.maxx, ng.maxy, ng.player_names.clone());
                self.maxx = maxx;
                self.maxy = maxy;
                self.player_names = names;
                self.game_over = false;
            }
            EventKind::Pixel(px) => {
                if px.player_no as usize >= self.player_names.len() {
                    return Err(StreamError::PlayerIndexOutOfRange);
                }
                if px.x >= self.maxx || px.y >= self.maxy {
                    return Err(StreamError::PixelOutsideMap);
                }
            }
            EventKind::PlayerEliminated(pe) => {
                if pe.player_no as usize >= self.player_names.len() {
                    return Err(StreamError::PlayerIndexOutOfRange);
                }
            }
            EventKind::GameOver => {
                self.game_over = true;
            }
        }

        self.next_event_no += 1;
        Ok(true)
    }

    pub fn has_pending_gui_event(&self) -> bool {
        self.gui_next_event_no < self.next_event_no
    }

    /// Move the next processed event out of its slot for GUI forwarding.
    pub fn pop_for_gui(&mut self) -> Option<GameEvent> {
        if self.gui_next_event_no >= self.next_event_no {
            return None;
        }
        let idx = self.gui_next_event_no as usize;
        self.gui_next_event_no += 1;
        self.events[idx].take()
    }
}

// ============================================================
// Tests
// ============================================================
