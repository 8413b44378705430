use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use netcurve_client::cl_main::{
    Client, GUI_DEFAULT_HOST, GUI_DEFAULT_PORT, SERVER_DEFAULT_PORT,
};
use netcurve_common::name::valid_player_name;
use netcurve_common::net::resolve_host_port;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Netcurve game client: speaks the game protocol to the server and the
/// line protocol to a GUI process.
#[derive(Parser, Debug)]
#[command(name = "netcurve-client")]
struct Cli {
    /// Name to play under
    player_name: String,

    /// Game server address as host[:port]
    game_server: String,

    /// GUI address as host[:port]
    gui: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            std::process::exit(0);
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if !valid_player_name(&cli.player_name) {
        eprintln!("Invalid player name.");
        std::process::exit(1);
    }

    let server_addr = resolve_host_port(&cli.game_server, SERVER_DEFAULT_PORT)
        .context("failed to resolve server address")?;
    info!(%server_addr, "resolved game server address");

    let gui_input = cli.gui.as_deref().unwrap_or(GUI_DEFAULT_HOST);
    let gui_addr =
        resolve_host_port(gui_input, GUI_DEFAULT_PORT).context("failed to resolve GUI address")?;
    info!(%gui_addr, "resolved GUI address");

    let mut client = Client::connect(cli.player_name, server_addr, gui_addr)?;
    client.run()
}
