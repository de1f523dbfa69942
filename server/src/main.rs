use std::env;

use barrage_server::config::ServerConfig;
use barrage_server::context::AppContext;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match env::args().nth(1) {
        Some(path) => match ServerConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => ServerConfig::default(),
    };

    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let ctx = AppContext::new(config);
    let starter = ctx.open_room(1);
    tracing::info!(room = starter.id(), "starter room open");
    println!("Barrage server core running, ctrl-c to stop");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    ctx.shutdown();
    tracing::info!("server stopped");
}
