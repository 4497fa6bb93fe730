//! Talk to EVI through the default microphone and speakers.

use std::sync::Arc;

use clap::Parser;
use hume_realtime::chat::{ChatRunner, MicrophoneSender};
use hume_realtime::types::events::client::SessionSettings;
use hume_realtime::utils::{DeviceSelector, Microphone, MicrophoneConfig, Speaker, SpeakerConfig};
use hume_realtime::{ChatConnectOptions, Error, HumeClient};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Voice chat with EVI")]
struct Args {
    /// Input device index, see the `devices` example
    #[arg(long)]
    input: Option<usize>,

    /// Output device index
    #[arg(long)]
    output: Option<usize>,

    /// Keep the microphone open while the assistant speaks
    #[arg(long)]
    allow_interrupt: bool,

    /// Stored EVI configuration to use
    #[arg(long)]
    config_id: Option<String>,

    #[arg(long)]
    system_prompt: Option<String>,
}

fn selector(index: Option<usize>) -> DeviceSelector {
    index.map(DeviceSelector::Index).unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv_override().ok();
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let mut microphone = Microphone::open(MicrophoneConfig::new().with_device(selector(args.input)))?;
    println!(
        "input: {} ({}ch, {}hz)",
        microphone.name(),
        microphone.channels(),
        microphone.sample_rate()
    );
    let sender = MicrophoneSender::from_microphone(&mut microphone)?.with_allow_interrupt(args.allow_interrupt);
    let speaker = Speaker::new(SpeakerConfig::new().with_device(selector(args.output)));

    let mut settings = SessionSettings::new();
    if let Some(prompt) = &args.system_prompt {
        settings = settings.with_system_prompt(prompt);
    }
    let mut options = ChatConnectOptions::new();
    if let Some(config_id) = &args.config_id {
        options = options.with_config_id(config_id);
    }

    let runner = ChatRunner::from_arcs(Arc::new(sender), Arc::new(speaker)).with_session_settings(settings);
    let handle = runner.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("stopping...");
            handle.stop();
        }
    });

    let client = HumeClient::from_env();
    match runner.run(client.chat(), &options).await {
        Ok(()) => Ok(()),
        Err(e @ Error::Authentication { .. }) => {
            eprintln!("{}. Set HUME_API_KEY in the environment or a .env file.", e);
            std::process::exit(1);
        }
        Err(e @ Error::Connection(_)) => {
            eprintln!("{}", e);
            std::process::exit(2);
        }
        Err(e) => Err(e.into()),
    }
}
