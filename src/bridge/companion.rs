//! The detached companion window. While it is open it owns playback; the
//! engine only forwards payloads and transport commands to it.

use crate::bridge::remote::RemoteCommand;
use crate::error::{AppError, AppResult};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Everything the companion needs to continue the current record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionPayload {
    pub title: String,
    pub artist: String,
    pub stream_locator: String,
    pub thumbnail_locator: String,
    pub elapsed_seconds: f64,
    pub duration_seconds: f64,
    pub volume: f32,
}

/// Signals sent back by the companion surface.
#[derive(Debug, Clone, PartialEq)]
pub enum CompanionSignal {
    /// Hand playback back to the main surface and keep playing.
    Expand { elapsed: f64 },
    /// The window went away; local control returns paused.
    Closed { elapsed: f64 },
    /// The companion reached the end of the current record.
    Ended,
    Progress { elapsed: f64 },
}

pub trait CompanionSurface: Send + Sync {
    /// Show the window and start `payload` at its elapsed position.
    fn open(&mut self, payload: &CompanionPayload) -> AppResult<()>;
    /// Switch the open window to a new record.
    fn update(&mut self, payload: &CompanionPayload) -> AppResult<()>;
    fn command(&mut self, command: &RemoteCommand) -> AppResult<()>;
    /// Close the window without reporting `Closed`.
    fn close(&mut self);
}

const EXPAND_MESSAGE: &str = "protoplayer-expand";

/// Keeps each window's IPC socket apart from one still shutting down.
static NEXT_SOCKET: AtomicU64 = AtomicU64::new(0);

/// Companion window backed by an always-on-top `mpv` process driven over
/// its JSON IPC socket.
pub struct MpvCompanion {
    program: String,
    socket_path: PathBuf,
    signals: mpsc::UnboundedSender<CompanionSignal>,
    session: Option<mpsc::UnboundedSender<serde_json::Value>>,
}

impl MpvCompanion {
    pub fn new(program: impl Into<String>, signals: mpsc::UnboundedSender<CompanionSignal>) -> Self {
        Self {
            program: program.into(),
            socket_path: fresh_socket_path(),
            signals,
            session: None,
        }
    }

    fn send(&self, command: serde_json::Value) -> AppResult<()> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| AppError::Companion("Companion window is not open".into()))?;
        session
            .send(command)
            .map_err(|_| AppError::Companion("Companion window has exited".into()))
    }
}

fn fresh_socket_path() -> PathBuf {
    std::env::temp_dir().join(format!(
        "protoplayer-mpv-{}-{}.sock",
        std::process::id(),
        NEXT_SOCKET.fetch_add(1, Ordering::Relaxed)
    ))
}

/// Translate a transport command to mpv IPC. `Next`/`Previous` stay with
/// the engine, which owns the queue.
pub fn mpv_command(command: &RemoteCommand) -> Option<serde_json::Value> {
    use serde_json::json;
    match command {
        RemoteCommand::Play => Some(json!({ "command": ["set_property", "pause", false] })),
        RemoteCommand::Pause => Some(json!({ "command": ["set_property", "pause", true] })),
        RemoteCommand::Toggle => Some(json!({ "command": ["cycle", "pause"] })),
        RemoteCommand::SeekTo(seconds) => {
            Some(json!({ "command": ["seek", seconds, "absolute"] }))
        }
        RemoteCommand::Next | RemoteCommand::Previous => None,
    }
}

/// Interpret one line of mpv IPC output.
pub fn parse_mpv_event(line: &str, elapsed: f64) -> Option<CompanionSignal> {
    let value: serde_json::Value = serde_json::from_str(line).ok()?;
    match value.get("event")?.as_str()? {
        "property-change" if value.get("name")?.as_str()? == "time-pos" => {
            let elapsed = value.get("data")?.as_f64()?;
            Some(CompanionSignal::Progress { elapsed })
        }
        "end-file" if value.get("reason").and_then(|r| r.as_str()) == Some("eof") => {
            Some(CompanionSignal::Ended)
        }
        "client-message" => {
            let args = value.get("args")?.as_array()?;
            (args.first()?.as_str()? == EXPAND_MESSAGE).then_some(CompanionSignal::Expand { elapsed })
        }
        _ => None,
    }
}

impl CompanionSurface for MpvCompanion {
    #[cfg(unix)]
    fn open(&mut self, payload: &CompanionPayload) -> AppResult<()> {
        if self.session.is_some() {
            self.close();
            self.socket_path = fresh_socket_path();
        }
        let _ = std::fs::remove_file(&self.socket_path);

        let child = tokio::process::Command::new(&self.program)
            .arg("--ontop")
            .arg("--idle=yes")
            .arg("--force-window=yes")
            .arg("--no-terminal")
            .arg("--geometry=420x240-24-24")
            .arg(format!("--input-ipc-server={}", self.socket_path.display()))
            .arg(format!("--start={:.3}", payload.elapsed_seconds.max(0.0)))
            .arg(format!("--volume={}", (payload.volume.clamp(0.0, 1.0) * 100.0).round()))
            .arg(format!("--force-media-title={} - {}", payload.title, payload.artist))
            .arg(&payload.stream_locator)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::Companion(format!("Failed to launch {}: {}", self.program, e)))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(ipc::run_session(
            child,
            self.socket_path.clone(),
            rx,
            self.signals.clone(),
            payload.elapsed_seconds,
        ));
        self.session = Some(tx);
        log::info!("[companion] Opened {} for \"{}\"", self.program, payload.title);
        Ok(())
    }

    #[cfg(not(unix))]
    fn open(&mut self, _payload: &CompanionPayload) -> AppResult<()> {
        Err(AppError::Companion(
            "Companion window needs a unix IPC socket".into(),
        ))
    }

    fn update(&mut self, payload: &CompanionPayload) -> AppResult<()> {
        use serde_json::json;
        // The launch-time --start offset would otherwise apply to every file.
        self.send(json!({ "command": ["set_property", "start", "none"] }))?;
        self.send(json!({ "command": ["loadfile", payload.stream_locator, "replace"] }))?;
        self.send(json!({
            "command": ["set_property", "force-media-title", format!("{} - {}", payload.title, payload.artist)]
        }))?;
        self.send(json!({ "command": ["set_property", "pause", false] }))
    }

    fn command(&mut self, command: &RemoteCommand) -> AppResult<()> {
        match mpv_command(command) {
            Some(value) => self.send(value),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        // Dropping the sender makes the session quit mpv quietly.
        if self.session.take().is_some() {
            log::info!("[companion] Closing {}", self.program);
        }
    }
}

#[cfg(unix)]
mod ipc {
    use super::{parse_mpv_event, CompanionSignal, EXPAND_MESSAGE};
    use serde_json::json;
    use std::path::PathBuf;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::UnixStream;
    use tokio::process::Child;
    use tokio::sync::mpsc;

    const EXPAND_KEY: &str = "e";
    const CONNECT_ATTEMPTS: usize = 50;
    const CONNECT_DELAY: Duration = Duration::from_millis(100);
    const QUIT_GRACE: Duration = Duration::from_secs(2);

    async fn connect(path: &PathBuf) -> std::io::Result<UnixStream> {
        let mut last_err = None;
        for _ in 0..CONNECT_ATTEMPTS {
            match UnixStream::connect(path).await {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
            tokio::time::sleep(CONNECT_DELAY).await;
        }
        Err(last_err.unwrap_or_else(|| std::io::Error::other("mpv socket never appeared")))
    }

    async fn write_json<W: AsyncWriteExt + Unpin>(
        writer: &mut W,
        value: &serde_json::Value,
    ) -> std::io::Result<()> {
        let mut line = value.to_string();
        line.push('\n');
        writer.write_all(line.as_bytes()).await
    }

    pub(super) async fn run_session(
        mut child: Child,
        socket_path: PathBuf,
        mut commands: mpsc::UnboundedReceiver<serde_json::Value>,
        signals: mpsc::UnboundedSender<CompanionSignal>,
        start_elapsed: f64,
    ) {
        let mut elapsed = start_elapsed;
        let stream = match connect(&socket_path).await {
            Ok(stream) => stream,
            Err(e) => {
                log::warn!("[companion] Could not reach mpv IPC: {}", e);
                let _ = child.kill().await;
                let _ = signals.send(CompanionSignal::Closed { elapsed });
                return;
            }
        };

        let (read, mut write) = stream.into_split();
        let mut lines = BufReader::new(read).lines();
        let setup = [
            json!({ "command": ["observe_property", 1, "time-pos"] }),
            json!({ "command": ["keybind", EXPAND_KEY, format!("script-message {}", EXPAND_MESSAGE)] }),
        ];
        for value in &setup {
            if let Err(e) = write_json(&mut write, value).await {
                log::warn!("[companion] IPC setup failed: {}", e);
            }
        }

        let mut closing = false;
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(value) => {
                        if let Err(e) = write_json(&mut write, &value).await {
                            log::warn!("[companion] IPC write failed: {}", e);
                            break;
                        }
                    }
                    None => {
                        let _ = write_json(&mut write, &json!({ "command": ["quit"] })).await;
                        closing = true;
                        break;
                    }
                },
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(signal) = parse_mpv_event(&line, elapsed) {
                            if let CompanionSignal::Progress { elapsed: at } = signal {
                                elapsed = at;
                            }
                            let _ = signals.send(signal);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        log::warn!("[companion] IPC read failed: {}", e);
                        break;
                    }
                },
            }
        }

        if closing {
            if tokio::time::timeout(QUIT_GRACE, child.wait()).await.is_err() {
                let _ = child.kill().await;
            }
        } else {
            let _ = child.kill().await;
            let _ = signals.send(CompanionSignal::Closed { elapsed });
        }
        let _ = std::fs::remove_file(&socket_path);
        log::info!("[companion] Session ended at {:.1}s", elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mpv_events_become_signals() {
        assert_eq!(
            parse_mpv_event(r#"{"event":"property-change","id":1,"name":"time-pos","data":12.5}"#, 0.0),
            Some(CompanionSignal::Progress { elapsed: 12.5 })
        );
        assert_eq!(
            parse_mpv_event(r#"{"event":"end-file","reason":"eof"}"#, 3.0),
            Some(CompanionSignal::Ended)
        );
        assert_eq!(parse_mpv_event(r#"{"event":"end-file","reason":"stop"}"#, 3.0), None);
        assert_eq!(
            parse_mpv_event(r#"{"event":"client-message","args":["protoplayer-expand"]}"#, 42.0),
            Some(CompanionSignal::Expand { elapsed: 42.0 })
        );
        assert_eq!(parse_mpv_event(r#"{"request_id":0,"error":"success"}"#, 0.0), None);
        assert_eq!(parse_mpv_event("not json", 0.0), None);
    }

    #[test]
    fn transport_commands_map_to_ipc() {
        assert_eq!(
            mpv_command(&RemoteCommand::SeekTo(30.0)).unwrap()["command"][0],
            "seek"
        );
        assert_eq!(
            mpv_command(&RemoteCommand::Pause).unwrap()["command"][2],
            true
        );
        assert!(mpv_command(&RemoteCommand::Next).is_none());
    }

    #[test]
    fn commands_without_a_window_fail() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut companion = MpvCompanion::new("mpv", tx);
        assert!(companion.command(&RemoteCommand::Play).is_err());
        companion.close();
    }

    #[test]
    fn each_window_gets_its_own_socket() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let first = MpvCompanion::new("mpv", tx.clone());
        let second = MpvCompanion::new("mpv", tx);
        assert_ne!(first.socket_path, second.socket_path);
    }

    #[tokio::test]
    async fn missing_program_fails_to_open() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut companion = MpvCompanion::new("/nonexistent/protoplayer-mpv", tx);
        let payload = CompanionPayload {
            title: "T".into(),
            artist: "A".into(),
            stream_locator: "http://127.0.0.1:1/x".into(),
            thumbnail_locator: String::new(),
            elapsed_seconds: 0.0,
            duration_seconds: 0.0,
            volume: 0.5,
        };
        assert!(companion.open(&payload).is_err());
    }
}
