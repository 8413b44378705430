// cl_gui.rs — line-oriented TCP bridge to the GUI process
//
// The GUI sends key transitions; we send it the processed event stream as
// text. Nagle is disabled so single-line writes leave immediately.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};

use netcurve_common::event::{EventKind, GameEvent};
use tracing::warn;

const READ_CHUNK: usize = 512;

pub struct GuiLink {
    stream: TcpStream,
    recv_buffer: Vec<u8>,
    left_key_down: bool,
    right_key_down: bool,
}

impl GuiLink {
    pub fn connect(addr: SocketAddr) -> io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        stream.set_nonblocking(true)?;
        Ok(Self {
            stream,
            recv_buffer: Vec::new(),
            left_key_down: false,
            right_key_down: false,
        })
    }

    /// Net turn direction from the currently held keys.
    pub fn turn_direction(&self) -> i8 {
        (self.right_key_down as i8) - (self.left_key_down as i8)
    }

    /// Read one complete line if available. `Ok(None)` means no full line
    /// yet; a closed connection is an error (the GUI is not optional).
    pub fn poll_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(line) = take_line(&mut self.recv_buffer) {
                return Ok(Some(line));
            }
            let mut chunk = [0u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "GUI socket disconnected",
                    ))
                }
                Ok(n) => self.recv_buffer.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) => return Err(e),
            }
        }
    }

    /// Apply one key-transition line to the held-key state.
    pub fn handle_key_line(&mut self, line: &str) {
        match line {
            "LEFT_KEY_DOWN" => self.left_key_down = true,
            "LEFT_KEY_UP" => self.left_key_down = false,
            "RIGHT_KEY_DOWN" => self.right_key_down = true,
            "RIGHT_KEY_UP" => self.right_key_down = false,
            other => warn!(line = other, "unrecognized message from GUI"),
        }
    }

    /// Write one line, retrying a not-ready socket a bounded number of
    /// times. Partial progress does not consume a retry.
    pub fn send_line(&mut self, line: &str, max_tries: usize) -> io::Result<()> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');

        let mut sent = 0;
        let mut tries = 0;
        while sent < data.len() {
            match self.stream.write(&data[sent..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "GUI socket closed while sending",
                    ))
                }
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    tries += 1;
                    if tries >= max_tries {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "GUI not ready after repeated send attempts",
                        ));
                    }
                    std::thread::yield_now();
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Split the first newline-terminated line out of the buffer.
fn take_line(buf: &mut Vec<u8>) -> Option<String> {
    let pos = buf.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buf.drain(..=pos).collect();
    line.pop();
    Some(String::from_utf8_lossy(&line).into_owned())
}

/// Render one event for the GUI. GameOver has no text form; the GUI learns
/// of the next game from its NEW_GAME line.
pub fn event_to_text(event: &GameEvent, player_names: &[String]) -> Option<String> {
    match &event.kind {
        EventKind::NewGame(ng) => {
            let mut line = format!("NEW_GAME {} {}", ng.maxx, ng.maxy);
            for name in &ng.player_names {
                line.push(' ');
                line.push_str(name);
            }
            Some(line)
        }
        EventKind::Pixel(px) => player_names
            .get(px.player_no as usize)
            .map(|name| format!("PIXEL {} {} {}", px.x, px.y, name)),
        EventKind::PlayerEliminated(pe) => player_names
            .get(pe.player_no as usize)
            .map(|name| format!("PLAYER_ELIMINATED {}", name)),
        EventKind::GameOver => None,
    }
}

// ============================================================
// Tests
// ============================================================
