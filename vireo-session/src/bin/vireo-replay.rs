//! Drive a playback session against a simulated player and log what the
//! view would see: session states, caption changes and progress writes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::{Builder, Target};
use log::{LevelFilter, info, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use vireo_config::SessionConfig;
use vireo_model::{
    BackendConnection, PlaybackEvent, RawTranscript, SavedProgress, VideoId, VideoMeta,
    format_display_time,
};
use vireo_session::backend::{BridgeCommand, BridgeMessage, ChannelPeer, ReplyValue};
use vireo_session::{
    LocalBackend, MediaElement, MemoryProgressStore, PlaybackBackend, PlaybackSession,
    RemoteBridgeBackend, SessionDeps, SimulatedMedia, TranscriptResolver, channel_bridge,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendChoice {
    Local,
    Remote,
}

#[derive(Debug, Parser)]
#[command(name = "vireo-replay", about = "Replay a playback session against a simulated player")]
struct Cli {
    /// Config file; defaults to the VIREO_* environment and ./vireo.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Transcript to attach (WebVTT or timestamped lines)
    #[arg(long)]
    transcript: Option<PathBuf>,

    #[arg(long, default_value_t = 120.0)]
    duration: f64,

    /// Seed saved progress at this position
    #[arg(long)]
    resume_at: Option<f64>,

    /// Saved percentage to seed; derived from --resume-at when omitted
    #[arg(long)]
    percentage: Option<f64>,

    /// Wall-clock seconds to let the session run
    #[arg(long, default_value_t = 15)]
    run_for: u64,

    #[arg(long, default_value = "en")]
    locale: String,

    #[arg(long, value_enum, default_value = "local")]
    backend: BackendChoice,
}

fn init_logger() {
    Builder::new()
        .target(Target::Stdout)
        .filter_level(LevelFilter::Warn)
        .filter_module("vireo_session", LevelFilter::Debug)
        .filter_module("vireo_replay", LevelFilter::Debug)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        init_logger();
    } else {
        env_logger::init();
    }

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SessionConfig::load_from_file(path)?,
        None => SessionConfig::load_from_env()?.config,
    };
    for warning in config.validate()? {
        warn!("config: {}: {}", warning.field, warning.message);
    }

    let video_id = VideoId::new("replay")?;
    let connection = match cli.backend {
        BackendChoice::Local => BackendConnection::Local {
            source: "file:///replay/video.mp4".parse()?,
        },
        BackendChoice::Remote => BackendConnection::Remote {
            embed_url: "https://player.example.com/embed/replay".parse()?,
            player_id: None,
        },
    };
    let mut meta = VideoMeta::new(video_id.clone(), cli.duration, connection)?;
    if let Some(path) = &cli.transcript {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read transcript {}", path.display()))?;
        meta = meta.with_transcript(cli.locale.clone(), RawTranscript::from(text));
    }

    let mut store = MemoryProgressStore::new();
    if let Some(at) = cli.resume_at {
        let percentage = cli
            .percentage
            .unwrap_or_else(|| if cli.duration > 0.0 { at / cli.duration * 100.0 } else { 0.0 });
        store = store.with_progress(video_id.clone(), SavedProgress::at(at, percentage));
    }
    let store = Arc::new(store);

    let media = Arc::new(SimulatedMedia::new(cli.duration).with_load_delay(Duration::from_millis(300)));
    let cancel = CancellationToken::new();
    let backend: Arc<dyn PlaybackBackend> = match cli.backend {
        BackendChoice::Local => Arc::new(LocalBackend::from_config(media.clone(), &config)),
        BackendChoice::Remote => {
            let (transport, inbound, peer) = channel_bridge(config.bridge.event_capacity);
            tokio::spawn(simulated_player(
                peer,
                media.clone(),
                config.view.local_tick(),
                cancel.clone(),
            ));
            Arc::new(RemoteBridgeBackend::attach(
                Arc::new(transport),
                inbound,
                &config.bridge,
            ))
        }
    };

    let deps = SessionDeps {
        store: store.clone(),
        transcripts: TranscriptResolver::new(&config.transcript),
        scroller: None,
    };
    let session = PlaybackSession::start(meta, backend, deps, &config, &cli.locale)?;

    let mut states = session.watch_state();
    let mut captions = session.watch_caption();
    let deadline = tokio::time::sleep(Duration::from_secs(cli.run_for));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                info!("state -> {:?} at {}", state, format_display_time(media.position()));
            }
            changed = captions.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(text) = captions.borrow_and_update().as_deref() {
                    info!("caption: {}", text);
                }
            }
        }
    }

    session.shutdown().await;
    cancel.cancel();
    // Give the teardown flush a moment to land.
    tokio::time::sleep(Duration::from_millis(200)).await;

    for (video, update) in store.writes() {
        println!(
            "saved {} at {} ({:.1}%{})",
            video,
            format_display_time(update.time_watched),
            update.progress_percentage,
            if update.is_completed { ", completed" } else { "" }
        );
    }
    Ok(())
}

/// Plays the embedded player's part of the bridge over a simulated element.
async fn simulated_player(
    mut peer: ChannelPeer,
    media: Arc<SimulatedMedia>,
    tick: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(tick);
    let mut announced = false;
    let mut ended = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            command = peer.commands.recv() => {
                let Some(command) = command else { break };
                if let Some(message) = apply_command(&media, command) {
                    send(&peer.messages, message).await;
                }
            }
            _ = ticker.tick() => {
                if !announced && media.is_loaded() {
                    announced = true;
                    send(&peer.messages, BridgeMessage::Event(PlaybackEvent::Ready)).await;
                }
                if announced && !media.is_paused() {
                    let seconds = media.position();
                    send(&peer.messages, BridgeMessage::Event(PlaybackEvent::TimeUpdate { seconds })).await;
                }
                if !ended && media.has_ended() {
                    ended = true;
                    send(&peer.messages, BridgeMessage::Event(PlaybackEvent::Ended)).await;
                }
            }
        }
    }
}

fn apply_command(media: &SimulatedMedia, command: BridgeCommand) -> Option<BridgeMessage> {
    match command {
        BridgeCommand::Play => match media.set_paused(false) {
            Ok(()) => Some(BridgeMessage::Event(PlaybackEvent::Play)),
            Err(err) => {
                warn!("simulated player refused play: {}", err);
                None
            }
        },
        BridgeCommand::Pause => {
            let _ = media.set_paused(true);
            Some(BridgeMessage::Event(PlaybackEvent::Pause))
        }
        BridgeCommand::SetCurrentTime { seconds } => {
            if let Err(err) = media.set_position(seconds) {
                warn!("simulated player rejected seek: {}", err);
            }
            None
        }
        BridgeCommand::GetCurrentTime { request_id } => Some(BridgeMessage::Reply {
            request_id,
            value: ReplyValue::Seconds(media.position()),
        }),
        BridgeCommand::GetPaused { request_id } => Some(BridgeMessage::Reply {
            request_id,
            value: ReplyValue::Paused(media.is_paused()),
        }),
    }
}

async fn send(messages: &mpsc::Sender<BridgeMessage>, message: BridgeMessage) {
    if messages.send(message).await.is_err() {
        warn!("bridge closed while sending");
    }
}
