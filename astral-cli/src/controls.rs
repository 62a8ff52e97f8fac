use astral_lib::audio::{AudioMode, Channel};
use astral_lib::playback::VoiceStatus;
use astral_lib::session::ConnectionState;

use crate::cli::config::parse_level;

pub const HELP: &str = "\
commands:
  <text>                 send a player action
  /pause, /resume        pause or resume all audio
  /replay                replay the current turn's narration
  /stop                  stop narration
  /mode <m>              full | dialogue | ambient | off
  /volume <ch> <0..1>    narrator | npc | ambient | sfx
  /roll                  roll for the pending prompt
  /sheet                 show the character sheet
  /status                show session and audio status
  /log                   show recent log lines
  /join <campaign>       switch to another campaign
  /leave                 leave the session
  /quit                  exit";

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Say(String),
    Pause,
    Resume,
    Replay,
    Stop,
    Mode(AudioMode),
    Volume(Channel, f32),
    Roll,
    Sheet,
    Status,
    Log,
    Join(String),
    Leave,
    Quit,
    Help,
    Empty,
}

/// Parse one console line. Lines not starting with `/` are player actions.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ConsoleCommand::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(ConsoleCommand::Say(line.to_string()));
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    let rest: Vec<&str> = parts.collect();
    let parsed = match (name.as_str(), rest.as_slice()) {
        ("pause", []) => ConsoleCommand::Pause,
        ("resume", []) => ConsoleCommand::Resume,
        ("replay", []) => ConsoleCommand::Replay,
        ("stop", []) => ConsoleCommand::Stop,
        ("mode", [mode]) => ConsoleCommand::Mode(mode.parse()?),
        ("volume", [channel, level]) => ConsoleCommand::Volume(
            channel.parse()?,
            parse_level(level).map_err(|err| err.to_string())?,
        ),
        ("roll", []) => ConsoleCommand::Roll,
        ("sheet", []) => ConsoleCommand::Sheet,
        ("status", []) => ConsoleCommand::Status,
        ("log", []) => ConsoleCommand::Log,
        ("join", [campaign]) => ConsoleCommand::Join(campaign.to_string()),
        ("leave", []) => ConsoleCommand::Leave,
        ("quit" | "exit", []) => ConsoleCommand::Quit,
        ("help" | "?", []) => ConsoleCommand::Help,
        _ => return Err(format!("unrecognised command '{}' (try /help)", line)),
    };
    Ok(parsed)
}

pub struct StatusArgs {
    pub campaign: Option<String>,
    pub connection: ConnectionState,
    pub voice: VoiceStatus,
    pub mode: AudioMode,
    pub volumes: Vec<(Channel, f32)>,
    pub waiting: bool,
    pub hydrating: bool,
    pub pending_roll: Option<String>,
}

pub fn status_text(args: StatusArgs) -> String {
    let campaign = args.campaign.as_deref().unwrap_or("-");
    let mut flags = Vec::new();
    if args.waiting {
        flags.push("waiting for DM");
    }
    if args.hydrating {
        flags.push("replaying opening");
    }
    let volumes: Vec<String> = args
        .volumes
        .iter()
        .map(|(channel, level)| {
            let muted = if args.mode.is_audible(*channel) { "" } else { " (muted by mode)" };
            format!("{} {:.0}%{}", channel, level * 100.0, muted)
        })
        .collect();

    let mut text = format!(
        "campaign: {} ({})\nvoice: {} | mode: {}\nvolume: {}",
        campaign,
        args.connection,
        args.voice,
        args.mode,
        volumes.join(", ")
    );
    if !flags.is_empty() {
        text.push_str(&format!("\n{}", flags.join(", ")));
    }
    if let Some(roll) = args.pending_roll {
        text.push_str(&format!("\npending roll: {}", roll));
    }
    text
}
