use clap::Parser;
use client::{describe, FeedClient, FeedItem};
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Prints the bridge's live game event feed", long_about = None)]
struct Args {
    /// Event feed URL
    #[arg(short = 'u', long, default_value = "ws://127.0.0.1:8081")]
    url: String,

    /// Print the JSON as received instead of a summary
    #[arg(short = 'r', long)]
    raw: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.url);
    let mut feed = FeedClient::connect(&args.url).await?;
    info!("Subscribed to event feed");

    while let Some(item) = feed.next_item().await {
        match item? {
            FeedItem::Event { raw, event } => {
                if args.raw {
                    println!("{}", raw);
                } else {
                    println!("{}", describe(&event));
                }
            }
            FeedItem::Undecodable { raw, error } => {
                warn!("Skipping undecodable frame ({}): {}", error, raw);
            }
        }
    }

    info!("Event feed closed");
    Ok(())
}
