// cl_main.rs — client bootstrap, heartbeat driver and the main loop
//
// One cooperative pass: heartbeat, GUI input, heartbeat again (a flooding
// GUI must not starve the server), GUI forwarding, event processing, UDP
// intake. Every stage is bounded by the heartbeat deadline; the heartbeat
// always wins.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use netcurve_common::datagram::{EventBatch, MAX_DATAGRAM_SIZE};
use netcurve_common::heartbeat::HeartBeat;
use netcurve_common::net::udp_socket_for;
use tracing::{debug, info};

use crate::cl_gui::{event_to_text, GuiLink};
use crate::cl_parse::EventTracker;

pub const SERVER_DEFAULT_PORT: u16 = 12345;
pub const GUI_DEFAULT_HOST: &str = "localhost";
pub const GUI_DEFAULT_PORT: u16 = 12346;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_millis(20);
pub const SERVER_TIMEOUT: Duration = Duration::from_secs(60);

/// Attempts per critical send before giving up on the session.
pub const SEND_MAX_TRIES: usize = 3;

pub struct Client {
    player_name: String,
    server_addr: SocketAddr,
    socket: UdpSocket,
    gui: GuiLink,
    tracker: EventTracker,
    session_id: u64,
    next_heartbeat_time: Instant,
    last_server_response: Instant,
}

impl Client {
    pub fn connect(
        player_name: String,
        server_addr: SocketAddr,
        gui_addr: SocketAddr,
    ) -> anyhow::Result<Self> {
        let gui = GuiLink::connect(gui_addr).context("failed to connect to the GUI")?;
        info!(%gui_addr, "connected to GUI");

        let socket =
            udp_socket_for(&server_addr).context("failed to open the game server socket")?;
        info!(%server_addr, "opened game server socket");

        // a fresh session id per process start; the server only compares
        // it against the previous one from this address
        let session_id = chrono::Utc::now().timestamp_micros() as u64;

        let now = Instant::now();
        Ok(Self {
            player_name,
            server_addr,
            socket,
            gui,
            tracker: EventTracker::new(),
            session_id,
            next_heartbeat_time: now,
            last_server_response: now,
        })
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            if self.heartbeat_pending() {
                self.send_heartbeat()?;
            }
            self.handle_gui_input()?;
            if self.heartbeat_pending() {
                self.send_heartbeat()?;
            }

            self.forward_events_to_gui()?;
            self.process_events()?;
            self.receive_events()?;

            if !self.pending_work() {
                std::thread::yield_now();
            }
        }
    }

    fn heartbeat_pending(&self) -> bool {
        self.next_heartbeat_time <= Instant::now()
    }

    fn send_heartbeat(&mut self) -> anyhow::Result<()> {
        let hb = HeartBeat {
            session_id: self.session_id,
            turn_direction: self.gui.turn_direction(),
            next_expected_event_no: self.tracker.next_event_no(),
            player_name: self.player_name.clone(),
        };
        self.next_heartbeat_time = Instant::now() + HEARTBEAT_INTERVAL;

        let data = hb.serialize();
        let mut tries = 0;
        loop {
            match self.socket.send_to(&data, self.server_addr) {
                Ok(_) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tries += 1;
                    if tries >= SEND_MAX_TRIES {
                        bail!("failed to send heartbeat after {} attempts", SEND_MAX_TRIES);
                    }
                    std::thread::yield_now();
                }
                Err(e) => {
                    return Err(e).context("game server socket error while sending");
                }
            }
        }
    }

    fn handle_gui_input(&mut self) -> anyhow::Result<()> {
        while !self.heartbeat_pending() {
            match self.gui.poll_line().context("GUI connection failed")? {
                Some(line) => self.gui.handle_key_line(&line),
                None => return Ok(()),
            }
        }
        Ok(())
    }

    fn forward_events_to_gui(&mut self) -> anyhow::Result<()> {
        while !self.heartbeat_pending() && self.tracker.has_pending_gui_event() {
            let Some(event) = self.tracker.pop_for_gui() else {
                break;
            };
            if let Some(line) = event_to_text(&event, self.tracker.player_names()) {
                self.gui
                    .send_line(&line, SEND_MAX_TRIES)
                    .context("failed to send data to the GUI")?;
            }
        }
        Ok(())
    }

    fn process_events(&mut self) -> anyhow::Result<()> {
        while !self.heartbeat_pending() {
            match self.tracker.process_next() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(e) => return Err(e).context("server sent a logically invalid event stream"),
            }
        }
        Ok(())
    }

    fn receive_events(&mut self) -> anyhow::Result<()> {
        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        while !self.heartbeat_pending() {
            let (n, addr) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if self.last_server_response + SERVER_TIMEOUT < Instant::now() {
                        bail!("game server timed out");
                    }
                    return Ok(());
                }
                Err(e) => {
                    return Err(e).context("game server socket error while receiving");
                }
            };

            if addr != self.server_addr {
                info!(%addr, "ignoring datagram from an unknown peer");
                continue;
            }
            let Some(batch) = EventBatch::deserialize(&buf[..n]) else {
                debug!("dropping malformed datagram from the server");
                continue;
            };

            self.last_server_response = Instant::now();
            self.tracker
                .accept_batch(batch)
                .context("server sent a logically invalid event stream")?;
        }
        Ok(())
    }

    fn pending_work(&self) -> bool {
        self.heartbeat_pending()
            || self.tracker.has_pending_gui_event()
            || self.tracker.has_processable()
    }
}
