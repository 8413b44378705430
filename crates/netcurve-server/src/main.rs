use clap::error::ErrorKind;
use clap::Parser;
use netcurve_common::rng::GameRng;
use netcurve_server::config::ServerConfig;
use netcurve_server::sv_main::Server;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = match ServerConfig::try_parse() {
        Ok(config) => config,
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

    let seed = config
        .seed
        .unwrap_or_else(|| chrono::Utc::now().timestamp() as u64);
    let mut server = Server::new(config, GameRng::new(seed))?;
    server.run()
}
