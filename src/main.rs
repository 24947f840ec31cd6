use reel::app::{AppOptions, run};
use reel::model::MediaKind;
use std::path::PathBuf;
use time::UtcOffset;

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    kind: MediaKind,
    folder: Option<PathBuf>,
    player: Option<Vec<String>>,
    resume: Option<bool>,
    shuffle: Option<bool>,
}

fn main() -> anyhow::Result<()> {
    // The local offset can only be read while the process is single-threaded.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let args = parse_args(std::env::args().skip(1).collect())?;

    if let Err(err) = reel::logging::setup_logging(utc_offset) {
        eprintln!("logging disabled: {err:#}");
    }
    log::info!("starting {} variant", args.kind.label());

    run(AppOptions {
        kind: args.kind,
        folder: args.folder,
        player_command: args.player,
        resume_last: args.resume,
        shuffle: args.shuffle,
        utc_offset,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--music" => out.kind = MediaKind::Audio,
            "--reel" => out.kind = MediaKind::Video,
            "--folder" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--folder requires a path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--folder cannot be empty");
                }
                out.folder = Some(PathBuf::from(value.trim()));
            }
            "--player" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--player requires a command");
                };
                let command: Vec<String> = value.split_whitespace().map(String::from).collect();
                if command.is_empty() {
                    anyhow::bail!("--player cannot be empty");
                }
                out.player = Some(command);
            }
            "--resume" => out.resume = Some(true),
            "--no-resume" => out.resume = Some(false),
            "--shuffle" => out.shuffle = Some(true),
            "--in-order" => out.shuffle = Some(false),
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("reel");
    println!("  --music           Play songs (default)");
    println!("  --reel            Shuffle videos through an external player");
    println!("  --folder PATH     Folder to scan");
    println!("  --player CMD      Video player command, e.g. \"mpv --fs\"");
    println!("  --resume          Start at the last item after a scan");
    println!("  --no-resume       Start at the first item after a scan");
    println!("  --shuffle         Shuffle songs instead of playing them in folder order");
    println!("  --in-order        Play in folder order (default for --music)");
    println!("Environment: REEL_CONFIG_DIR, REEL_LOG");
}
