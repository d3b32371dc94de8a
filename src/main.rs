use std::io::Write;
use std::sync::Arc;

use log::error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use tally_console::config::AppConfig;
use tally_console::handlers::{self, Flow};
use tally_console::session::Session;
use tally_console::store::memory::MemoryStore;
use tally_console::store::ResultStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();
    let store: Arc<dyn ResultStore> = Arc::new(MemoryStore::new(&config));

    // Startup sign-in is the one fatal failure: without an identity no
    // workflow is possible, so the console refuses to start.
    let identity = match store.sign_in_anonymously().await {
        Ok(identity) => identity,
        Err(err) => {
            error!("sign-in failed: {}", err);
            eprintln!("Could not start the console: {}", err.user_message());
            return;
        }
    };

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let mut session = Session::new(Arc::clone(&store), identity, events_tx);
    session.start();

    println!("Election Results Operator Console");
    println!(
        "Signed in as {}. Type 'help' for commands.",
        session.identity().uid
    );
    prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        match handlers::handle_line(&mut session, &line).await {
                            Ok(Flow::Quit) => break,
                            Ok(Flow::Continue) => {}
                            Err(err) => error!("command handler error: {}", err),
                        }
                        prompt();
                    }
                    Ok(None) => break,
                    Err(err) => {
                        error!("failed to read input: {}", err);
                        break;
                    }
                }
            }
            event = events_rx.recv() => {
                match event {
                    Some(event) => handlers::handle_event(&mut session, event),
                    None => break,
                }
            }
        }
    }

    session.shutdown();
    println!("Goodbye.");
}

fn prompt() {
    print!("tally> ");
    let _ = std::io::stdout().flush();
}
