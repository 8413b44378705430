// sv_game.rs — grid occupancy, the event log, and the tick simulation

use std::time::Instant;

use netcurve_common::event::{
    names_wire_len, EventKind, GameEvent, NewGame, Pixel, PlayerEliminated, NAMES_CAPACITY,
};
use netcurve_common::rng::GameRng;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::server::SessionRegistry;

// ============================================================
// Grid
// ============================================================

/// Dense bit array over the map cells. Reallocated for every game.
#[derive(Debug)]
pub struct Grid {
    width: u32,
    height: u32,
    words: Vec<u64>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Self {
        let bits = width as usize * height as usize;
        Self {
            width,
            height,
            words: vec![0; (bits + 63) / 64],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn reset(&mut self) {
        let bits = self.width as usize * self.height as usize;
        self.words = vec![0; (bits + 63) / 64];
    }

    fn bit(&self, x: u32, y: u32) -> (usize, u64) {
        debug_assert!(x < self.width && y < self.height);
        let cell = y as usize * self.width as usize + x as usize;
        (cell / 64, 1u64 << (cell % 64))
    }

    pub fn is_occupied(&self, x: u32, y: u32) -> bool {
        let (word, mask) = self.bit(x, y);
        self.words[word] & mask != 0
    }

    pub fn occupy(&mut self, x: u32, y: u32) {
        let (word, mask) = self.bit(x, y);
        self.words[word] |= mask;
    }
}

// ============================================================
// Event log
// ============================================================

/// Append-only sequence of serialized event records for the current game.
/// The record at index i carries event_no i; fan-out reads it by position.
#[derive(Debug, Default)]
pub struct EventLog {
    records: Vec<Vec<u8>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> u32 {
        self.records.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Vec<u8>] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Number the event, serialize it once and append the record. An event
    /// that fails validation is dropped without consuming a number.
    pub fn emit(&mut self, kind: EventKind) {
        let event = GameEvent {
            event_no: self.len(),
            kind,
        };
        if !event.validate() {
            warn!(event_no = event.event_no, "dropping invalid game event");
            return;
        }
        self.records.push(event.serialize());
    }
}

// ============================================================
// Players and game state
// ============================================================

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    pub turn_direction: i8,
    pub alive: bool,
    pub pos_x: f64,
    pub pos_y: f64,
    /// Heading in degrees, kept in [0, 360).
    pub angle: f64,
}

#[derive(Debug)]
pub struct GameState {
    pub game_id: u32,
    pub in_progress: bool,
    pub players: Vec<Player>,
    alive_count: usize,
    pub grid: Grid,
    pub log: EventLog,
    pub next_tick_time: Instant,
}

impl GameState {
    pub fn new(config: &ServerConfig, now: Instant) -> Self {
        Self {
            game_id: 0,
            in_progress: false,
            players: Vec::new(),
            alive_count: 0,
            grid: Grid::new(config.map_width, config.map_height),
            log: EventLog::new(),
            next_tick_time: now,
        }
    }

    pub fn tick_due(&self, now: Instant) -> bool {
        self.next_tick_time <= now
    }

    /// Start a game if at least two named sessions signalled readiness.
    /// Returns whether a game was started.
    pub fn try_start(
        &mut self,
        registry: &mut SessionRegistry,
        rng: &mut GameRng,
        config: &ServerConfig,
    ) -> bool {
        let mut names: Vec<String> = registry
            .iter()
            .filter(|s| !s.name.is_empty() && s.ready_to_play)
            .map(|s| s.name.clone())
            .collect();
        if names.len() < 2 {
            return false;
        }

        names.sort();
        // the announcement must fit a single datagram; late names lose
        while names_wire_len(&names) > NAMES_CAPACITY {
            names.pop();
        }

        self.game_id = rng.next() as u32;
        self.log.clear();
        self.grid.reset();
        self.in_progress = true;

        for session in registry.iter_mut() {
            session.watching_game = true;
            session.got_new_game_event = false;
            session.ready_to_play = false;
            session.player_no = names
                .iter()
                .position(|n| *n == session.name)
                .map(|i| i as i8)
                .unwrap_or(-1);
        }

        info!(game_id = self.game_id, players = names.len(), "starting game");
        self.log.emit(EventKind::NewGame(NewGame {
            maxx: config.map_width,
            maxy: config.map_height,
            player_names: names.clone(),
        }));

        self.players = names
            .into_iter()
            .map(|name| Player {
                name,
                turn_direction: 0,
                alive: true,
                pos_x: 0.0,
                pos_y: 0.0,
                angle: 0.0,
            })
            .collect();
        self.alive_count = self.players.len();

        for i in 0..self.players.len() {
            let (x, y) = {
                let p = &mut self.players[i];
                p.pos_x = (rng.next() % config.map_width as u64) as f64 + 0.5;
                p.pos_y = (rng.next() % config.map_height as u64) as f64 + 0.5;
                p.angle = (rng.next() % 360) as f64;
                (p.pos_x.floor() as u32, p.pos_y.floor() as u32)
            };
            if self.grid.is_occupied(x, y) {
                if self.eliminate(i) {
                    break;
                }
            } else {
                self.grid.occupy(x, y);
                self.log.emit(EventKind::Pixel(Pixel {
                    player_no: i as u8,
                    x,
                    y,
                }));
            }
        }

        true
    }

    /// Advance every living player by one tick. Aborts mid-tick when an
    /// elimination ends the game.
    pub fn advance_tick(&mut self, turning_speed: u32) {
        let step = turning_speed as f64;

        for i in 0..self.players.len() {
            if !self.players[i].alive {
                continue;
            }

            let (old_cell, new_cell) = {
                let p = &mut self.players[i];
                match p.turn_direction {
                    1 => p.angle = (p.angle + step).rem_euclid(360.0),
                    -1 => p.angle = (p.angle - step).rem_euclid(360.0),
                    _ => {}
                }
                let old_cell = (p.pos_x.floor() as i64, p.pos_y.floor() as i64);
                let radians = p.angle.to_radians();
                p.pos_x += radians.cos();
                p.pos_y += radians.sin();
                let new_cell = (p.pos_x.floor() as i64, p.pos_y.floor() as i64);
                (old_cell, new_cell)
            };

            if new_cell == old_cell {
                continue;
            }

            let (cx, cy) = new_cell;
            let off_map = cx < 0
                || cy < 0
                || cx >= self.grid.width() as i64
                || cy >= self.grid.height() as i64;

            if off_map || self.grid.is_occupied(cx as u32, cy as u32) {
                if self.eliminate(i) {
                    return;
                }
            } else {
                self.grid.occupy(cx as u32, cy as u32);
                self.log.emit(EventKind::Pixel(Pixel {
                    player_no: i as u8,
                    x: cx as u32,
                    y: cy as u32,
                }));
            }
        }
    }

    /// Returns true when the elimination ended the game.
    fn eliminate(&mut self, player_no: usize) -> bool {
        self.players[player_no].alive = false;
        self.alive_count -= 1;
        info!(name = %self.players[player_no].name, "player eliminated");
        self.log.emit(EventKind::PlayerEliminated(PlayerEliminated {
            player_no: player_no as u8,
        }));

        if self.alive_count <= 1 {
            self.log.emit(EventKind::GameOver);
            self.in_progress = false;
            info!(game_id = self.game_id, "game over");
            return true;
        }
        false
    }
}

// ============================================================
// Tests
// ============================================================
