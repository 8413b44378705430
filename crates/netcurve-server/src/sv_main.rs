// sv_main.rs — server bootstrap and the main loop
//
// Single-threaded cooperative loop: session upkeep, then input intake and
// outbound fan-out interleaved until the next simulation tick is due, then
// one tick. The tick schedule advances by a fixed period per tick, not by
// wall time, so a stalled server catches up explicitly.

use std::io;
use std::net::UdpSocket;
use std::time::{Duration, Instant};

use anyhow::Context;
use netcurve_common::datagram::MAX_DATAGRAM_SIZE;
use netcurve_common::heartbeat::HeartBeat;
use netcurve_common::net::bind_udp_dual_stack;
use netcurve_common::rng::GameRng;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::server::SessionRegistry;
use crate::sv_game::GameState;
use crate::sv_send::send_events_to_clients;

pub struct Server {
    config: ServerConfig,
    socket: UdpSocket,
    registry: SessionRegistry,
    game: GameState,
    rng: GameRng,
    tick_period: Duration,
}

impl Server {
    pub fn new(config: ServerConfig, rng: GameRng) -> anyhow::Result<Self> {
        info!(
            width = config.map_width,
            height = config.map_height,
            rounds_per_second = config.rounds_per_second,
            turning_speed = config.turning_speed,
            port = config.port,
            seed = rng.peek(),
            "server configuration"
        );

        let socket =
            bind_udp_dual_stack(config.port).context("failed to initialize server socket")?;
        let tick_period = Duration::from_micros(1_000_000 / config.rounds_per_second as u64);
        let game = GameState::new(&config, Instant::now());

        Ok(Self {
            config,
            socket,
            registry: SessionRegistry::new(),
            game,
            rng,
            tick_period,
        })
    }

    pub fn run(&mut self) -> ! {
        info!(port = self.config.port, "server listening");
        loop {
            self.registry.sweep_timeouts(Instant::now());

            loop {
                self.handle_client_input();
                send_events_to_clients(
                    &self.socket,
                    &mut self.registry,
                    &self.game,
                    Instant::now(),
                );

                if !self.pending_work() {
                    std::thread::yield_now();
                }
                if self.game.tick_due(Instant::now()) {
                    break;
                }
            }

            self.update_game();
        }
    }

    /// Take in at most one datagram, so intake keeps interleaving with
    /// fan-out and the tick check.
    fn handle_client_input(&mut self) {
        if self.game.tick_due(Instant::now()) {
            return;
        }

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (n, addr) = match self.socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
            Err(e) => {
                debug!(error = %e, "receive failed");
                return;
            }
        };

        let Some(hb) = HeartBeat::deserialize(&buf[..n]) else {
            debug!(%addr, "dropping malformed heartbeat");
            return;
        };

        let now = Instant::now();
        let Some(idx) = self
            .registry
            .admit(addr, &hb, self.game.in_progress, now)
        else {
            return;
        };

        let session = self.registry.get_mut(idx);
        if !session.ready_to_play && !self.game.in_progress && hb.turn_direction != 0 {
            info!(name = %session.name, "client is ready");
            session.ready_to_play = true;
        }

        // only currently mapped players steer the simulation
        if session.player_no >= 0 {
            let player_no = session.player_no as usize;
            if let Some(player) = self.game.players.get_mut(player_no) {
                player.turn_direction = hb.turn_direction;
            }
        }
    }

    fn update_game(&mut self) {
        self.game.next_tick_time += self.tick_period;

        if self.game.in_progress {
            self.game.advance_tick(self.config.turning_speed);
        } else {
            self.game
                .try_start(&mut self.registry, &mut self.rng, &self.config);
        }
    }

    fn pending_work(&self) -> bool {
        if self.game.tick_due(Instant::now()) {
            return true;
        }
        let log_len = self.game.log.len();
        self.registry
            .iter()
            .any(|s| s.watching_game && s.next_event_no < log_len)
    }
}
