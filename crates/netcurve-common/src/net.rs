// net.rs — address resolution and UDP socket setup shared by client and server

use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use socket2::{Domain, Protocol, Socket, Type};

/// Split `host[:port]` and resolve it, falling back to `default_port` when
/// no port is given.
///
/// Supports:
/// - "example.org" or "example.org:12345" -> DNS resolution
/// - "10.0.0.1:12345" -> literal IPv4
/// - "::1" -> bare IPv6 (always the default port; colons are ambiguous)
/// - "[::1]" or "[::1]:12345" -> bracketed IPv6
pub fn resolve_host_port(input: &str, default_port: u16) -> io::Result<SocketAddr> {
    let bad_input = |what: &str| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} in {:?}", what, input),
        )
    };

    let (host, port) = if let Some(stripped) = input.strip_prefix('[') {
        // bracketed IPv6: [addr] or [addr]:port
        let (host, rest) = stripped
            .split_once(']')
            .ok_or_else(|| bad_input("unterminated address bracket"))?;
        let port = match rest.strip_prefix(':') {
            Some(p) => p.parse::<u16>().map_err(|_| bad_input("invalid port number"))?,
            None if rest.is_empty() => default_port,
            None => return Err(bad_input("trailing characters")),
        };
        (host, port)
    } else {
        match input.rfind(':') {
            None => (input, default_port),
            // more than one colon without brackets: a bare IPv6 address
            Some(pos) if input[..pos].contains(':') => (input, default_port),
            Some(pos) => {
                let port = input[pos + 1..]
                    .parse::<u16>()
                    .map_err(|_| bad_input("invalid port number"))?;
                (&input[..pos], port)
            }
        }
    };

    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no address found for {:?}", input),
            )
        })
}

/// Open the server endpoint: one nonblocking IPv6 socket with the
/// dual-stack option, so IPv4 peers arrive as v4-mapped addresses.
pub fn bind_udp_dual_stack(port: u16) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(false)?;
    let addr = SocketAddr::from((Ipv6Addr::UNSPECIFIED, port));
    socket.bind(&addr.into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Open a nonblocking ephemeral-port socket of the same family as `peer`,
/// for client-side traffic.
pub fn udp_socket_for(peer: &SocketAddr) -> io::Result<UdpSocket> {
    let socket = match peer {
        SocketAddr::V4(_) => UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?,
        SocketAddr::V6(_) => UdpSocket::bind((Ipv6Addr::UNSPECIFIED, 0))?,
    };
    socket.set_nonblocking(true)?;
    Ok(socket)
}

// ============================================================
// Tests
// ============================================================
