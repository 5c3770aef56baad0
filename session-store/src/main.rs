// session-store/src/main.rs
// NexusAI session console

use common::{setup_tracing, Config};
use session_store::console::{self, Command};
use session_store::{Collaborators, SessionHandle};
use std::io::{Error, ErrorKind};
use tokio::io::{AsyncBufReadExt, BufReader};

#[actix::main]
async fn main() -> std::io::Result<()> {
    // Load configuration
    let config = Config::from_env().map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;

    // Setup tracing
    if let Err(e) = setup_tracing(&config.log_level) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    tracing::info!("Starting session store with {:?} authority", config.authority);

    let collaborators = Collaborators::from_config(&config)
        .map_err(|e| Error::new(ErrorKind::InvalidInput, e.to_string()))?;
    let handle = SessionHandle::start(collaborators);

    if let Err(e) = handle.ready().await {
        tracing::error!("Session store failed to start: {}", e);
        return Err(Error::new(ErrorKind::Other, e.to_string()));
    }

    println!("NexusAI - {}", console::describe(&handle));
    println!("Type 'help' for commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(console::CommandError::Empty) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let quit = command == Command::Quit;
        println!("{}", console::execute(&handle, command).await);
        if quit {
            break;
        }
    }

    handle.shutdown();
    Ok(())
}
