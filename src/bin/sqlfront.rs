use sqlfront::auth::CredentialQuery;
use sqlfront::config::{self, Config};
use sqlfront::console::Console;
use sqlfront::core::Result;
use sqlfront::server::Server;
use std::io;
use tracing::info;

/// Front-end the console session connects through.
const CONSOLE_FRONTEND: &str = "mysql";

fn load(args: &[String]) -> Result<Config> {
    match args.get(1) {
        Some(path) => config::load_config(path),
        None => config::load_default_config(),
    }
}

fn credentials() -> CredentialQuery {
    let user = std::env::var("SQLFRONT_USER").unwrap_or_else(|_| "root".to_string());
    let query = CredentialQuery::new(&user);
    match std::env::var("SQLFRONT_PASSWORD") {
        Ok(password) => query.with_password(&password),
        Err(_) => query,
    }
}

fn run(args: &[String]) -> Result<()> {
    let config = load(args)?;
    let mut server = Server::new(config)?;
    server.start()?;
    info!("Starting sqlfront console...");

    let result = server
        .connect(CONSOLE_FRONTEND, &credentials(), None)
        .and_then(|session| {
            let mut console = Console::new(&server, CONSOLE_FRONTEND, session);
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            console.run(stdin.lock(), &mut stdout)
        });

    let stopped = server.stop();
    result?;
    stopped
}

fn main() {
    // Parse CLI arguments: an optional configuration file path
    let args: Vec<String> = std::env::args().collect();
    if let Err(e) = run(&args) {
        eprintln!("sqlfront: {}", e);
        std::process::exit(1);
    }
}
