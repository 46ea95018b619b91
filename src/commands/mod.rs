//! The interactive shell: one text command per line, each mapped onto the
//! public operations of the engine, the catalog and the preference store.

pub mod browse_commands;
pub mod favorites_commands;
pub mod playback_commands;
pub mod queue_commands;
pub mod search_commands;

use crate::api::models::{format_time, VideoRecord};
use crate::audio::element::MediaElement;
use crate::audio::engine::SEEK_STEP_SECS;
use crate::bridge::remote::RemoteCommand;
use crate::error::{AppError, AppResult};
use crate::AppState;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

pub const HELP: &str = "\
browse:   list [limit] [offset] | top | random | search <q> | series | episodes <id> | mix <id>
play:     play <n> | add <n> | next-up <n> | play | pause | toggle | next | prev | seek-to <s>
queue:    queue | remove <i> | move <from> <to> | clear | shuffle | repeat
library:  fav [n] | favorites | history [clear]
sound:    vol <0-100> | mute | bass <db> | seek <+|-|+/-secs|secs>
external: detach | expand | presence on|off
other:    status | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum SeekTarget {
    Absolute(f64),
    Relative(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    List { limit: u32, offset: u32 },
    Top,
    Random,
    Search(String),
    Series,
    Episodes(String),
    Mix(String),
    Play(usize),
    Add(usize),
    NextUp(usize),
    Queue,
    Remove(usize),
    Move(usize, usize),
    Clear,
    Favorite(Option<usize>),
    Favorites,
    History,
    ClearHistory,
    Volume(u32),
    Mute,
    Bass(f32),
    Shuffle,
    Repeat,
    Seek(SeekTarget),
    Detach,
    Expand,
    Presence(bool),
    Status,
    Transport(RemoteCommand),
    Help,
    Quit,
}

fn number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> AppResult<T> {
    let word = word.ok_or_else(|| AppError::InvalidCommand(format!("missing {}", what)))?;
    word.parse()
        .map_err(|_| AppError::InvalidCommand(format!("{} is not a valid {}", word, what)))
}

fn rest(words: &[&str], what: &str) -> AppResult<String> {
    if words.is_empty() {
        return Err(AppError::InvalidCommand(format!("missing {}", what)));
    }
    Ok(words.join(" "))
}

impl ShellCommand {
    /// Parse one shell line. `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> AppResult<Option<Self>> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = words.split_first() else {
            return Ok(None);
        };
        let arg = args.first().copied();

        let command = match head.to_ascii_lowercase().as_str() {
            "list" => ShellCommand::List {
                limit: arg.map(|a| number(Some(a), "limit")).transpose()?.unwrap_or(20),
                offset: args
                    .get(1)
                    .map(|a| number(Some(a), "offset"))
                    .transpose()?
                    .unwrap_or(0),
            },
            "top" => ShellCommand::Top,
            "random" => ShellCommand::Random,
            "search" => ShellCommand::Search(rest(args, "query")?),
            "series" => ShellCommand::Series,
            "episodes" => ShellCommand::Episodes(rest(args, "series id")?),
            "mix" => ShellCommand::Mix(rest(args, "series id")?),
            "play" if arg.is_some() => ShellCommand::Play(number(arg, "listing number")?),
            "add" => ShellCommand::Add(number(arg, "listing number")?),
            "next-up" => ShellCommand::NextUp(number(arg, "listing number")?),
            "queue" => ShellCommand::Queue,
            "remove" => ShellCommand::Remove(number(arg, "queue position")?),
            "move" => ShellCommand::Move(
                number(arg, "queue position")?,
                number(args.get(1).copied(), "queue position")?,
            ),
            "clear" => ShellCommand::Clear,
            "fav" => ShellCommand::Favorite(arg.map(|a| number(Some(a), "listing number")).transpose()?),
            "favorites" => ShellCommand::Favorites,
            "history" if arg == Some("clear") => ShellCommand::ClearHistory,
            "history" => ShellCommand::History,
            "vol" => ShellCommand::Volume(number(arg, "volume")?),
            "mute" => ShellCommand::Mute,
            "bass" => ShellCommand::Bass(number(arg, "bass boost")?),
            "shuffle" => ShellCommand::Shuffle,
            "repeat" => ShellCommand::Repeat,
            "seek" => {
                let word = arg.ok_or_else(|| AppError::InvalidCommand("missing position".into()))?;
                let value: f64 = match word {
                    "+" => SEEK_STEP_SECS,
                    "-" => -SEEK_STEP_SECS,
                    _ => number(Some(word), "position")?,
                };
                if word.starts_with('+') || word.starts_with('-') {
                    ShellCommand::Seek(SeekTarget::Relative(value))
                } else {
                    ShellCommand::Seek(SeekTarget::Absolute(value))
                }
            }
            "detach" => ShellCommand::Detach,
            "expand" => ShellCommand::Expand,
            "presence" => match arg {
                Some("on") => ShellCommand::Presence(true),
                Some("off") => ShellCommand::Presence(false),
                _ => return Err(AppError::InvalidCommand("presence on|off".into())),
            },
            "status" => ShellCommand::Status,
            "help" | "?" => ShellCommand::Help,
            "quit" | "exit" => ShellCommand::Quit,
            _ => match RemoteCommand::parse(line) {
                Some(command) => ShellCommand::Transport(command),
                None => {
                    return Err(AppError::InvalidCommand(format!(
                        "unknown command '{}', type 'help'",
                        head
                    )))
                }
            },
        };
        Ok(Some(command))
    }
}

pub fn format_record(record: &VideoRecord) -> String {
    let duration = record
        .duration_seconds()
        .map(format_time)
        .unwrap_or_else(|| "--:--".to_string());
    format!("{} - {} [{}]", record.title, record.artist(), duration)
}

pub fn format_listing(records: &[VideoRecord]) -> String {
    if records.is_empty() {
        return "No results".to_string();
    }
    records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{:>3}. {}", i + 1, format_record(r)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Record picked by its 1-based number in the last listing.
pub async fn listing_item<E: MediaElement>(state: &AppState<E>, n: usize) -> AppResult<VideoRecord> {
    let listing = state.listing.lock().await;
    n.checked_sub(1)
        .and_then(|i| listing.get(i))
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("No item {} in the last listing", n)))
}

pub async fn remember_listing<E: MediaElement>(state: &AppState<E>, records: Vec<VideoRecord>) -> String {
    let text = format_listing(&records);
    *state.listing.lock().await = records;
    text
}

/// Run one command and return what should be printed.
pub async fn execute<E: MediaElement>(state: &AppState<E>, command: ShellCommand) -> AppResult<String> {
    use ShellCommand::*;
    match command {
        List { limit, offset } => browse_commands::list(state, limit, offset).await,
        Top => browse_commands::top(state).await,
        Random => browse_commands::random(state).await,
        Search(query) => search_commands::search(state, &query).await,
        Series => browse_commands::series(state).await,
        Episodes(id) => browse_commands::episodes(state, &id).await,
        Mix(id) => browse_commands::mix(state, &id).await,
        Play(n) => playback_commands::play_listing_item(state, n).await,
        Add(n) => queue_commands::add(state, n).await,
        NextUp(n) => queue_commands::next_up(state, n).await,
        Queue => queue_commands::show(state).await,
        Remove(i) => queue_commands::remove(state, i).await,
        Move(from, to) => queue_commands::move_item(state, from, to).await,
        Clear => queue_commands::clear(state).await,
        Favorite(n) => favorites_commands::toggle(state, n).await,
        Favorites => favorites_commands::list(state).await,
        History => favorites_commands::history(state).await,
        ClearHistory => favorites_commands::clear_history(state).await,
        Volume(v) => playback_commands::volume(state, v).await,
        Mute => playback_commands::mute(state).await,
        Bass(db) => playback_commands::bass(state, db).await,
        Shuffle => queue_commands::shuffle(state).await,
        Repeat => queue_commands::repeat(state).await,
        Seek(target) => playback_commands::seek(state, target).await,
        Detach => playback_commands::detach(state).await,
        Expand => playback_commands::expand(state).await,
        Presence(on) => favorites_commands::presence(state, on).await,
        Status => playback_commands::status(state).await,
        Transport(command) => playback_commands::transport(state, command).await,
        Help => Ok(HELP.to_string()),
        Quit => Ok(String::new()),
    }
}

/// Read commands from stdin until `quit` or end of input.
pub async fn run_shell<E: MediaElement>(state: Arc<AppState<E>>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("protoplayer ready, type 'help' for commands");
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                log::error!("[shell] Failed to read stdin: {}", e);
                break;
            }
        };
        let command = match ShellCommand::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        match execute(&state, command).await {
            Ok(output) if output.is_empty() => {}
            Ok(output) => println!("{}", output),
            Err(e) => println!("error: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        assert_eq!(
            ShellCommand::parse("list 10 40").unwrap(),
            Some(ShellCommand::List { limit: 10, offset: 40 })
        );
        assert_eq!(
            ShellCommand::parse("list").unwrap(),
            Some(ShellCommand::List { limit: 20, offset: 0 })
        );
        assert_eq!(
            ShellCommand::parse("search daft punk").unwrap(),
            Some(ShellCommand::Search("daft punk".into()))
        );
        assert_eq!(ShellCommand::parse("move 3 1").unwrap(), Some(ShellCommand::Move(3, 1)));
        assert_eq!(ShellCommand::parse("fav").unwrap(), Some(ShellCommand::Favorite(None)));
        assert_eq!(ShellCommand::parse("   ").unwrap(), None);
    }

    #[test]
    fn play_without_number_is_transport() {
        assert_eq!(
            ShellCommand::parse("play").unwrap(),
            Some(ShellCommand::Transport(RemoteCommand::Play))
        );
        assert_eq!(ShellCommand::parse("play 2").unwrap(), Some(ShellCommand::Play(2)));
        assert_eq!(
            ShellCommand::parse("seek-to 30").unwrap(),
            Some(ShellCommand::Transport(RemoteCommand::SeekTo(30.0)))
        );
    }

    #[test]
    fn seek_sign_selects_relative() {
        assert_eq!(
            ShellCommand::parse("seek +5").unwrap(),
            Some(ShellCommand::Seek(SeekTarget::Relative(5.0)))
        );
        assert_eq!(
            ShellCommand::parse("seek -5").unwrap(),
            Some(ShellCommand::Seek(SeekTarget::Relative(-5.0)))
        );
        assert_eq!(
            ShellCommand::parse("seek 90").unwrap(),
            Some(ShellCommand::Seek(SeekTarget::Absolute(90.0)))
        );
        assert_eq!(
            ShellCommand::parse("seek -").unwrap(),
            Some(ShellCommand::Seek(SeekTarget::Relative(-5.0)))
        );
    }

    #[test]
    fn bad_input_is_an_invalid_command() {
        for line in ["dance", "play two", "vol", "presence maybe", "search"] {
            let err = ShellCommand::parse(line).unwrap_err();
            assert_eq!(err.kind(), "invalid_command", "{}", line);
        }
    }
}
