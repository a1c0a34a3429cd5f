//! Fake ECON console for trying the bridge without a game server.
//!
//! Accepts one console client at a time, checks the password, then relays
//! every line typed on stdin as console output and logs the commands the
//! client sends back. Example:
//!
//! ```text
//! echo "[x][chat]: 0:0:Foo: hello" | fake_econ --password secret
//! ```

use clap::Parser;
use log::{info, warn};
use server::fake_console::FakeConsole;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8303")]
    bind: String,

    /// Password clients must send
    #[arg(short, long, env = "APISERVER_ECON_PASSWORD", hide_env_values = true)]
    password: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let console = FakeConsole::bind(&args.bind, &args.password).await?;
    info!("Fake ECON listening on {}", console.local_addr()?);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let session = match console.accept().await? {
            Some(session) => session,
            None => continue,
        };
        let peer = session.peer();
        let (mut reader, mut writer) = session.into_parts();

        let mut commands = tokio::spawn(async move {
            while let Ok(Some(line)) = reader.recv_line().await {
                info!("Command from {}: {}", peer, line);
            }
        });

        loop {
            tokio::select! {
                _ = &mut commands => {
                    info!("Console client {} disconnected", peer);
                    break;
                }
                line = stdin.next_line() => match line? {
                    Some(line) => {
                        if let Err(e) = writer.send_line(&line).await {
                            warn!("Failed to relay line to {}: {}", peer, e);
                            break;
                        }
                    }
                    None => {
                        info!("stdin closed, shutting down");
                        commands.abort();
                        return Ok(());
                    }
                },
            }
        }

        commands.abort();
    }
}
