// config.rs — server command line configuration

use clap::Parser;

/// Authoritative netcurve game server.
#[derive(Parser, Debug, Clone)]
#[command(name = "netcurve-server")]
pub struct ServerConfig {
    /// Map width in cells
    #[arg(short = 'W', default_value_t = 800,
          value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub map_width: u32,

    /// Map height in cells
    #[arg(short = 'H', default_value_t = 600,
          value_parser = clap::value_parser!(u32).range(1..=10_000))]
    pub map_height: u32,

    /// UDP port to listen on
    #[arg(short = 'p', default_value_t = 12345)]
    pub port: u16,

    /// Simulation ticks per second
    #[arg(short = 's', default_value_t = 50,
          value_parser = clap::value_parser!(u32).range(1..=1_000))]
    pub rounds_per_second: u32,

    /// Yaw applied per tick while a player holds a turn, in degrees
    #[arg(short = 't', default_value_t = 6,
          value_parser = clap::value_parser!(u32).range(1..=359))]
    pub turning_speed: u32,

    /// Seed for the game randomness (defaults to the wall clock)
    #[arg(short = 'r')]
    pub seed: Option<u64>,
}
