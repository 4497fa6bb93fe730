//! Scores the emotional language of each line read from stdin.

use hume_realtime::stream::StreamOptions;
use hume_realtime::types::stream::ModelsConfig;
use hume_realtime::HumeClient;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Level;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv_override().ok();
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let client = HumeClient::from_env();
    let socket = client
        .stream()
        .connect(StreamOptions::new(ModelsConfig::new().with_language()))
        .await?;
    println!("Connected, type a line and press enter (ctrl-d to quit)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = socket.send_text(&line).await?;
        match response.predictions("language") {
            Some(predictions) => println!("{}", serde_json::to_string_pretty(predictions)?),
            None => println!("no predictions"),
        }
    }

    socket.close().await;
    Ok(())
}
