//! CLI argument definitions for `astral`.

use clap::{Arg, ArgAction, Command};

/// Build the CLI argument parser and command definitions.
pub fn build_cli() -> Command {
    Command::new("Astral")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Play Astral tabletop sessions from the terminal")
        .arg_required_else_help(true)
        .arg(
            Arg::new("server")
                .long("server")
                .short('s')
                .value_name("URL")
                .env("ASTRAL_SERVER")
                .default_value(astral_lib::constants::DEFAULT_SERVER)
                .global(true)
                .help("Base URL of the Astral server"),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .value_name("DIR")
                .global(true)
                .help("Directory for the opening cache (defaults to the user cache dir)"),
        )
        .arg(
            Arg::new("mode")
                .long("mode")
                .short('m')
                .value_name("MODE")
                .value_parser(["full", "dialogue", "ambient", "off"])
                .default_value("full")
                .global(true)
                .help("Initial audio mode"),
        )
        .arg(
            Arg::new("volume")
                .long("volume")
                .value_name("CHANNEL=LEVEL")
                .action(ArgAction::Append)
                .global(true)
                .help("Initial channel volume, e.g. ambient=0.4 (repeatable)"),
        )
        .arg(
            Arg::new("no-audio")
                .long("no-audio")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Do not open an audio device"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only print replies to console commands"),
        )
        .subcommand(
            Command::new("play")
                .about("Join a campaign session")
                .arg(
                    Arg::new("CAMPAIGN")
                        .help("The campaign id")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(Command::new("campaigns").about("List campaigns on the server"))
        .subcommand(
            Command::new("import")
                .about("Upload a campaign PDF for import")
                .arg(
                    Arg::new("PDF")
                        .help("Path to the campaign PDF")
                        .required(true)
                        .index(1),
                ),
        )
        .subcommand(
            Command::new("cache")
                .about("Inspect the opening cache")
                .subcommand_required(true)
                .subcommand(Command::new("show").about("Print the cached opening"))
                .subcommand(Command::new("clear").about("Delete the cached opening")),
        )
        .subcommand(
            Command::new("probe")
                .about("Decode an audio clip and print its properties")
                .arg(
                    Arg::new("FILE")
                        .help("Audio file to decode")
                        .required(true)
                        .index(1),
                ),
        )
}
