use std::path::Path;
use std::sync::Arc;

use astral_lib::audio::{decode_clip, AudioError, AudioMode, Channel};
use astral_lib::playback::{
    AudioEngine, EventSink, MixingGraph, OutputBackend, PlaybackEvent, SilentOutput,
};
use astral_lib::session::{
    session_url, CampaignDirectory, ChatMessage, ControlMessage, FileStore, OpeningCache,
    Reconciler, Role, Routed, SessionError, SessionTransport, TransportEvent,
};
use clap::ArgMatches;
use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, UnboundedSender};

use crate::cli::config::ClientConfig;
use crate::console::Console;
use crate::controls::{self, ConsoleCommand, StatusArgs};
use crate::logging::{self, LogBuffer};

pub type RunResult = Result<i32, Box<dyn std::error::Error>>;

pub fn run(args: &ArgMatches, log_buffer: LogBuffer) -> RunResult {
    let config = ClientConfig::from_matches(args)?;

    match args.subcommand() {
        Some(("play", sub)) => {
            let campaign = sub
                .get_one::<String>("CAMPAIGN")
                .cloned()
                .unwrap_or_default();
            block_on(run_session(config, campaign, log_buffer))
        }
        Some(("campaigns", _)) => block_on(list_campaigns(config)),
        Some(("import", sub)) => {
            let pdf = sub.get_one::<String>("PDF").cloned().unwrap_or_default();
            block_on(import_campaign(config, pdf))
        }
        Some(("cache", sub)) => match sub.subcommand() {
            Some(("show", _)) => show_cache(&config),
            Some(("clear", _)) => clear_cache(&config),
            _ => Ok(-1),
        },
        Some(("probe", sub)) => {
            let file = sub.get_one::<String>("FILE").cloned().unwrap_or_default();
            probe(&file)
        }
        _ => Ok(-1),
    }
}

fn block_on<F>(future: F) -> RunResult
where
    F: std::future::Future<Output = RunResult>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

async fn list_campaigns(config: ClientConfig) -> RunResult {
    let campaigns = CampaignDirectory::new(&config.server).list().await?;
    if campaigns.is_empty() {
        println!("no campaigns on {}", config.server);
    }
    for campaign in campaigns {
        println!("{}", campaign);
    }
    Ok(0)
}

async fn import_campaign(config: ClientConfig, pdf: String) -> RunResult {
    let accepted = CampaignDirectory::new(&config.server)
        .import(Path::new(&pdf))
        .await?;
    println!("import {}: {}", accepted.status, accepted.filename);
    Ok(0)
}

fn open_cache(config: &ClientConfig) -> OpeningCache {
    OpeningCache::new(Box::new(FileStore::new(&config.cache_dir)))
}

fn show_cache(config: &ClientConfig) -> RunResult {
    match open_cache(config).peek() {
        Some(snapshot) => {
            println!(
                "campaign {}: {} opening messages",
                snapshot.campaign_id,
                snapshot.messages.len()
            );
            for message in &snapshot.messages {
                println!("{}", format_message(message));
            }
        }
        None => println!("no opening cached"),
    }
    Ok(0)
}

fn clear_cache(config: &ClientConfig) -> RunResult {
    open_cache(config).clear()?;
    println!("opening cache cleared");
    Ok(0)
}

fn probe(file: &str) -> RunResult {
    let bytes = std::fs::read(file)?;
    let clip = decode_clip(&bytes)?;
    println!("channels: {}", clip.channels);
    println!("sample rate: {}", clip.sample_rate);
    println!("frames: {}", clip.frames());
    println!("duration: {:.3}s", clip.duration().as_secs_f64());
    println!("peak: {:.3}", clip.peak());
    Ok(0)
}

fn format_message(message: &ChatMessage) -> String {
    let label = match message.role {
        Role::Dm => "DM",
        Role::Player => "you",
        Role::System => "system",
    };
    match &message.speaker {
        Some(speaker) => format!("[{} / {}] {}", label, speaker, message.content),
        None => format!("[{}] {}", label, message.content),
    }
}

fn silent_output() -> Result<Box<dyn OutputBackend>, AudioError> {
    Ok(Box::new(SilentOutput::start()))
}

async fn run_session(config: ClientConfig, campaign: String, log_buffer: LogBuffer) -> RunResult {
    let (playback_tx, mut playback_rx) = mpsc::unbounded_channel::<PlaybackEvent>();
    let sink: EventSink = Arc::new(move |event: PlaybackEvent| {
        let _ = playback_tx.send(event);
    });

    let graph = if config.no_audio {
        MixingGraph::new(silent_output)
    } else {
        MixingGraph::with_default_output()
    };
    let mut engine = AudioEngine::new(graph, sink);
    engine.set_mode(config.mode);
    for (channel, level) in &config.volumes {
        engine.set_volume(*channel, *level);
    }
    engine.set_status_observer(Box::new(|status| info!("voice {}", status)));

    let (transport_tx, mut transport_rx) = mpsc::unbounded_channel();
    let mut session = Session {
        reconciler: Reconciler::new(Box::new(FileStore::new(&config.cache_dir))),
        console: Console::stdout(config.quiet),
        config,
        engine,
        transport: None,
        next_connection: 0,
        transport_tx,
        log_buffer,
    };
    session.join(&campaign)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            Some(event) = transport_rx.recv() => session.on_transport(event),
            Some(event) = playback_rx.recv() => session.engine.handle_event(event),
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !session.on_line(&line) {
                        break;
                    }
                }
                None => break,
            },
        }
    }

    session.leave();
    Ok(0)
}

struct Session {
    config: ClientConfig,
    console: Console,
    engine: AudioEngine,
    reconciler: Reconciler,
    transport: Option<SessionTransport>,
    next_connection: u64,
    transport_tx: UnboundedSender<TransportEvent>,
    log_buffer: LogBuffer,
}

impl Session {
    /// Tear down the current session and connect to `campaign`.
    fn join(&mut self, campaign: &str) -> Result<(), SessionError> {
        let url = session_url(&self.config.server, campaign)?;
        self.transport = None;
        self.engine.close();

        let hydrated: Vec<String> = self
            .reconciler
            .select_campaign(campaign)
            .iter()
            .map(format_message)
            .collect();
        if !hydrated.is_empty() {
            self.console.notice(&format!("(restored {} opening messages)", hydrated.len()));
            for line in &hydrated {
                self.console.notice(line);
            }
        }

        self.next_connection += 1;
        self.transport = Some(SessionTransport::connect(
            self.next_connection,
            url,
            self.transport_tx.clone(),
        ));
        Ok(())
    }

    fn leave(&mut self) {
        self.transport = None;
        self.reconciler.leave();
        self.engine.close();
    }

    fn on_transport(&mut self, event: TransportEvent) {
        let current = self.transport.as_ref().map(SessionTransport::id);
        if current != Some(event.connection_id()) {
            debug!("ignoring event from stale connection {}", event.connection_id());
            return;
        }
        match event {
            TransportEvent::Opened(_) => {
                self.reconciler.on_connected();
                let line = format!("* connected to {}", self.reconciler.campaign_id().unwrap_or("-"));
                self.console.notice(&line);
                let mode = self.engine.mode();
                if mode != AudioMode::Full {
                    match self
                        .reconciler
                        .compose_control(ControlMessage::SetAudioMode { mode })
                    {
                        Ok(frame) => self.send(frame),
                        Err(err) => warn!("could not announce audio mode: {}", err),
                    }
                }
            }
            TransportEvent::Frame(_, frame) => {
                for routed in self.reconciler.handle_frame(&frame) {
                    self.apply(routed);
                }
            }
            TransportEvent::Closed(_) => {
                self.reconciler.on_disconnected();
                self.transport = None;
                self.console.notice("* disconnected (use /join to reconnect)");
            }
        }
    }

    fn apply(&mut self, routed: Routed) {
        match routed {
            Routed::Message(message) => self.console.notice(&format_message(&message)),
            Routed::Streaming { content, done } => {
                debug!("streaming ({}): {} chars", if done { "end" } else { "delta" }, content.len());
            }
            Routed::Character(state) => {
                self.console.notice(&format!("* {} HP {}/{}", state.name, state.hp, state.max_hp));
            }
            Routed::Audio(cue) => self.engine.route(cue),
            Routed::RollRequested(request) => {
                self.console.notice(&format!(
                    "* roll {} for {} (type /roll)",
                    request.notation, request.reason
                ));
            }
            Routed::RollResolved(result) => self.console.notice(&format!("* {}", result)),
        }
    }

    fn send(&self, frame: String) {
        match &self.transport {
            Some(transport) => {
                if let Err(err) = transport.send(frame) {
                    warn!("send failed: {}", err);
                }
            }
            None => warn!("send dropped: {}", SessionError::NotConnected),
        }
    }

    /// Handle one console line; returns false to quit.
    fn on_line(&mut self, line: &str) -> bool {
        let command = match controls::parse_command(line) {
            Ok(command) => command,
            Err(err) => {
                self.console.reply(&err.to_string());
                return true;
            }
        };

        match command {
            ConsoleCommand::Say(text) => match self.reconciler.send_action(&text) {
                Ok(frame) => {
                    self.engine.begin_turn();
                    self.send(frame);
                }
                Err(err) => warn!("action not sent: {}", err),
            },
            ConsoleCommand::Pause => self.engine.pause(),
            ConsoleCommand::Resume => self.engine.resume(),
            ConsoleCommand::Replay => self.engine.replay(),
            ConsoleCommand::Stop => self.engine.stop_voice(),
            ConsoleCommand::Mode(mode) => {
                self.engine.set_mode(mode);
                match self
                    .reconciler
                    .compose_control(ControlMessage::SetAudioMode { mode })
                {
                    Ok(frame) => self.send(frame),
                    Err(err) => debug!("mode change kept local: {}", err),
                }
            }
            ConsoleCommand::Volume(channel, level) => self.engine.set_volume(channel, level),
            ConsoleCommand::Roll => match self.reconciler.acknowledge_roll() {
                Ok(frame) => {
                    if let Err(err) = self.engine.play_dice_clatter() {
                        warn!("dice clatter failed: {}", err);
                    }
                    self.send(frame);
                }
                Err(err) => self.console.reply(&err.to_string()),
            },
            ConsoleCommand::Sheet => match self.reconciler.character() {
                Some(state) => self.console.reply(&state.to_string()),
                None => self.console.reply("no character yet"),
            },
            ConsoleCommand::Status => {
                let status = self.status();
                self.console.reply(&status);
            }
            ConsoleCommand::Log => {
                for line in logging::snapshot(&self.log_buffer) {
                    self.console.reply(&line);
                }
            }
            ConsoleCommand::Join(campaign) => {
                if let Err(err) = self.join(&campaign) {
                    self.console.reply(&err.to_string());
                }
            }
            ConsoleCommand::Leave => {
                self.leave();
                self.console.reply("* left the session (use /join <campaign>)");
            }
            ConsoleCommand::Quit => return false,
            ConsoleCommand::Help => self.console.reply(controls::HELP),
            ConsoleCommand::Empty => {}
        }
        true
    }

    fn status(&self) -> String {
        controls::status_text(StatusArgs {
            campaign: self.reconciler.campaign_id().map(str::to_string),
            connection: self.reconciler.connection(),
            voice: self.engine.voice_status(),
            mode: self.engine.mode(),
            volumes: Channel::ALL
                .iter()
                .map(|channel| (*channel, self.engine.volume(*channel)))
                .collect(),
            waiting: self.reconciler.is_waiting(),
            hydrating: self.reconciler.is_hydrating(),
            pending_roll: self
                .reconciler
                .pending_roll()
                .map(|roll| format!("{} for {}", roll.notation, roll.reason)),
        })
    }
}
