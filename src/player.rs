//! Playback engine backed by an external player process
//!
//! The process is the decoder and the window. There is no control channel
//! into it, so state is inferred from the process itself: launch means
//! buffering, surviving a short grace period means playing, exit means ended
//! or failed.

use crate::config::{AppConfig, BufferStrength};
use crate::engine::{EngineEvent, EngineState, PlaybackEngine};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How long a freshly launched player must stay up before it counts as playing
const STARTUP_GRACE: Duration = Duration::from_millis(1500);

pub struct ExternalPlayer {
    program: String,
    buffer: BufferStrength,
    user_agent: Option<String>,
    volume: u8,
    grace: Duration,
    child: Option<Child>,
    launched_at: Option<Instant>,
    playing: bool,
    pending: VecDeque<EngineEvent>,
}

impl ExternalPlayer {
    pub fn new(program: &str, buffer: BufferStrength) -> Self {
        Self {
            program: locate_program(program),
            buffer,
            user_agent: None,
            volume: 100,
            grace: STARTUP_GRACE,
            child: None,
            launched_at: None,
            playing: false,
            pending: VecDeque::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut player = Self::new(config.player_program(), config.buffer_strength);
        if config.pass_user_agent_to_player && !config.playlist_user_agent.is_empty() {
            player.user_agent = Some(config.playlist_user_agent.clone());
        }
        player
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn kill_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait(); // Reap the process
            log::debug!("Player process {} stopped", child.id());
        }
        self.launched_at = None;
        self.playing = false;
    }
}

impl PlaybackEngine for ExternalPlayer {
    fn load(&mut self, url: &str) {
        self.kill_child();
        self.pending.clear();

        let args = player_args(&self.program, url, self.buffer, self.user_agent.as_deref(), self.volume);
        let mut cmd = Command::new(&self.program);

        // Hide the console window for ffplay on Windows
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            if self.program.to_lowercase().contains("ffplay") {
                cmd.creation_flags(CREATE_NO_WINDOW);
            }
        }

        cmd.args(&args);
        cmd.stderr(Stdio::piped());
        cmd.stdout(Stdio::null());

        match cmd.spawn() {
            Ok(mut child) => {
                log::info!("Player launched: {} (PID: {})", self.program, child.id());

                if let Some(stderr) = child.stderr.take() {
                    let program = self.program.clone();
                    thread::spawn(move || {
                        let reader = BufReader::new(stderr);
                        for line in reader.lines().map_while(Result::ok) {
                            if !line.trim().is_empty() {
                                log::debug!("[{}] {}", program, line);
                            }
                        }
                    });
                }

                self.child = Some(child);
                self.launched_at = Some(Instant::now());
                self.pending.push_back(EngineEvent::StateChanged(EngineState::Buffering));
            }
            Err(e) => {
                log::error!("Failed to launch player '{}': {}", self.program, e);
                self.pending
                    .push_back(EngineEvent::Error(format!("failed to launch {}: {}", self.program, e)));
            }
        }
    }

    fn stop(&mut self) {
        self.kill_child();
        self.pending.clear();
    }

    fn pause(&mut self) {
        log::info!("Pause is not supported by external players");
    }

    fn resume(&mut self) {
        log::debug!("Resume requested for external player");
    }

    fn can_pause(&self) -> bool {
        false
    }

    fn seek_to(&mut self, position_ms: u64) {
        log::info!("Seek to {}ms is not supported by external players", position_ms);
    }

    fn set_volume(&mut self, percent: u8) {
        self.volume = percent.min(100);
        log::debug!("Player volume {}% (applied on next launch)", self.volume);
    }

    fn position_ms(&self) -> u64 {
        match self.launched_at {
            Some(at) if self.playing => at.elapsed().saturating_sub(self.grace).as_millis() as u64,
            _ => 0,
        }
    }

    fn duration_ms(&self) -> Option<u64> {
        None
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        if let Some(child) = self.child.as_mut() {
            match child.try_wait() {
                Ok(Some(status)) => {
                    self.child = None;
                    self.launched_at = None;
                    if self.playing {
                        self.playing = false;
                        self.pending.push_back(EngineEvent::IsPlayingChanged(false));
                    }
                    if status.success() {
                        log::info!("Player exited");
                        self.pending.push_back(EngineEvent::StateChanged(EngineState::Ended));
                    } else {
                        let cause = match status.code() {
                            Some(code) => format!("player exited with code {}", code),
                            None => "player terminated by signal".to_string(),
                        };
                        log::warn!("{}", cause);
                        self.pending.push_back(EngineEvent::Error(cause));
                    }
                }
                Ok(None) => {
                    let settled = self.launched_at.is_some_and(|at| at.elapsed() >= self.grace);
                    if settled && !self.playing {
                        self.playing = true;
                        self.pending.push_back(EngineEvent::StateChanged(EngineState::Ready));
                        self.pending.push_back(EngineEvent::IsPlayingChanged(true));
                    }
                }
                Err(e) => {
                    log::error!("Failed to query player process: {}", e);
                    self.pending.push_back(EngineEvent::Error(e.to_string()));
                }
            }
        }
        self.pending.drain(..).collect()
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.kill_child();
    }
}

/// Command line for `program`, tuned per known player
pub fn player_args(
    program: &str,
    url: &str,
    buffer: BufferStrength,
    user_agent: Option<&str>,
    volume: u8,
) -> Vec<String> {
    let program = program.to_lowercase();
    let buffer_ms = buffer.playback_buffer_ms();
    let cache_secs = buffer.max_buffer_secs();
    let is_http = url.starts_with("http");

    if program.contains("ffplay") {
        // ffplay takes input directly, not with -i
        let mut args = vec![
            url.to_string(),
            "-autoexit".to_string(),
            "-probesize".to_string(),
            format!("{}", (buffer_ms as usize) * 1024 * 4),
            "-analyzeduration".to_string(),
            format!("{}", buffer_ms * 1000), // microseconds
            "-sync".to_string(),
            "audio".to_string(),
            "-framedrop".to_string(),
            "-volume".to_string(),
            volume.to_string(),
        ];
        if is_http {
            args.extend([
                "-reconnect".to_string(),
                "1".to_string(),
                "-reconnect_streamed".to_string(),
                "1".to_string(),
                "-reconnect_delay_max".to_string(),
                "10".to_string(),
            ]);
        }
        if let Some(ua) = user_agent {
            args.extend(["-user_agent".to_string(), ua.to_string()]);
        }
        args
    } else if program.contains("mpv") {
        let mut args = vec![
            url.to_string(),
            "--cache=yes".to_string(),
            format!("--cache-secs={}", cache_secs),
            format!("--demuxer-readahead-secs={}", cache_secs),
            format!("--cache-pause-wait={}", buffer_ms as f64 / 1000.0),
            "--cache-pause-initial=yes".to_string(),
            "--network-timeout=60".to_string(),
            "--stream-lavf-o=reconnect=1".to_string(),
            "--stream-lavf-o=reconnect_streamed=1".to_string(),
            format!("--volume={}", volume),
            "--ytdl=no".to_string(),
        ];
        if let Some(ua) = user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args
    } else if program.contains("vlc") {
        let mut args = vec![
            url.to_string(),
            format!("--network-caching={}", buffer_ms),
            format!("--live-caching={}", buffer_ms),
            "--http-reconnect".to_string(),
        ];
        if let Some(ua) = user_agent {
            args.push(format!("--http-user-agent={}", ua));
        }
        args
    } else {
        // Generic player - just pass URL
        vec![url.to_string()]
    }
}

/// Known install locations for players that are often not on PATH
#[cfg(target_os = "windows")]
fn locate_program(program: &str) -> String {
    let candidates: &[&str] = match program.to_lowercase().as_str() {
        "vlc" | "vlc.exe" => &[
            r"C:\Program Files\VideoLAN\VLC\vlc.exe",
            r"C:\Program Files (x86)\VideoLAN\VLC\vlc.exe",
        ],
        "mpv" | "mpv.exe" => &[r"C:\Program Files\mpv\mpv.exe", r"C:\mpv\mpv.exe"],
        "ffplay" | "ffplay.exe" => &[r"C:\ffmpeg\bin\ffplay.exe", r"C:\Program Files\ffmpeg\bin\ffplay.exe"],
        _ => &[],
    };
    candidates
        .iter()
        .find(|path| std::path::Path::new(path).exists())
        .map(|s| s.to_string())
        .unwrap_or_else(|| program.to_string())
}

#[cfg(not(target_os = "windows"))]
fn locate_program(program: &str) -> String {
    program.to_string()
}
