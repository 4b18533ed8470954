//! IPTV Failover - command line player
//! Plays a channel from an M3U playlist through an external player and keeps it
//! alive by switching between alternative sources.

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::Parser;
use iptv_failover::{
    logging, m3u_parser, AppConfig, Direction, ExternalPlayer, PlaybackSession, RedirectResolver,
    SessionEvent, SourceCycle, SourceProber,
};
use log::LevelFilter;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const HELP: &str = "commands: n/p channel, s/S source, space pause, +/- volume, i info, q quit";

/// How often the control loop wakes up when there is no input
const TICK: Duration = Duration::from_millis(100);

const CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Parser, Debug)]
#[command(name = "iptv_failover")]
#[command(about = "Play an IPTV channel and keep it alive across alternative sources", long_about = None)]
struct Args {
    /// M3U playlist file or http(s) URL
    playlist: String,

    /// Channel number, starting at 1
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    channel: Option<u64>,

    /// Source number within the channel, starting at 1
    #[arg(value_parser = clap::value_parser!(u64).range(1..))]
    source: Option<u64>,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, env = "IPTV_FAILOVER_LOG", default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
}

impl Args {
    fn channel_index(&self) -> usize {
        self.channel.map_or(0, |n| (n - 1) as usize)
    }

    fn source_index(&self) -> Option<usize> {
        self.source.map(|n| (n - 1) as usize)
    }
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value.parse().map_err(|_| format!("unknown log level: {}", value))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UserCommand {
    NextChannel,
    PreviousChannel,
    NextSource,
    PreviousSource,
    TogglePause,
    VolumeUp,
    VolumeDown,
    Info,
    Quit,
}

fn parse_command(line: &str) -> Option<UserCommand> {
    let line = line.trim_end_matches(['\r', '\n']);
    if !line.is_empty() && line.trim().is_empty() {
        return Some(UserCommand::TogglePause);
    }
    match line.trim() {
        "n" => Some(UserCommand::NextChannel),
        "p" => Some(UserCommand::PreviousChannel),
        "s" => Some(UserCommand::NextSource),
        "S" => Some(UserCommand::PreviousSource),
        "pause" => Some(UserCommand::TogglePause),
        "+" => Some(UserCommand::VolumeUp),
        "-" => Some(UserCommand::VolumeDown),
        "i" => Some(UserCommand::Info),
        "q" | "quit" => Some(UserCommand::Quit),
        _ => None,
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(args.log_level) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let config = AppConfig::load();
    log::info!("Player: {} | Buffer: {:?}", config.player_program(), config.buffer_strength);

    let channels = match m3u_parser::load_channels(&args.playlist, &config.playlist_user_agent) {
        Ok(channels) => channels,
        Err(e) => {
            log::error!("Failed to load playlist {}: {}", args.playlist, e);
            return ExitCode::FAILURE;
        }
    };

    let resolver = Arc::new(RedirectResolver::new(&config.resolver));
    let prober = Arc::new(SourceProber::new(&config.prober));
    let engine = ExternalPlayer::from_config(&config);

    let mut session = match PlaybackSession::new(engine, channels, resolver.clone(), prober, config.failover.clone()) {
        Ok(session) => session,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = session.load_channel(args.channel_index(), args.source_index()) {
        log::error!("{}", e);
        return ExitCode::FAILURE;
    }
    println!("{}", HELP);

    // Stdin reader hands commands to the control loop
    let (sender, receiver) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines().map_while(Result::ok) {
            if let Some(command) = parse_command(&line) {
                if sender.send(command).is_err() {
                    break;
                }
            }
        }
    });

    let mut last_sweep = Instant::now();

    loop {
        match receiver.recv_timeout(TICK) {
            Ok(UserCommand::Quit) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => handle_command(&mut session, command),
            Err(RecvTimeoutError::Timeout) => {}
        }

        session.poll();
        for event in session.take_events() {
            report_event(&session, &event);
        }

        if last_sweep.elapsed() >= CACHE_SWEEP_INTERVAL {
            let evicted = resolver.clear_expired_cache() + session.session_cache().clear_expired();
            if evicted > 0 {
                log::debug!("Evicted {} expired redirect cache entries", evicted);
            }
            last_sweep = Instant::now();
        }
    }

    session.close();
    ExitCode::SUCCESS
}

fn handle_command(session: &mut PlaybackSession<ExternalPlayer>, command: UserCommand) {
    let result = match command {
        UserCommand::NextChannel => session.switch_channel(Direction::Next),
        UserCommand::PreviousChannel => session.switch_channel(Direction::Previous),
        UserCommand::NextSource | UserCommand::PreviousSource => {
            let direction = if command == UserCommand::NextSource {
                Direction::Next
            } else {
                Direction::Previous
            };
            session.cycle_source(direction).map(|outcome| {
                if outcome == SourceCycle::SingleSource {
                    println!("This channel has only one source");
                }
            })
        }
        // Engine state decides the direction; nothing is tracked here
        UserCommand::TogglePause => {
            if session.playback_snapshot().is_playing {
                session.pause()
            } else {
                session.play()
            }
        }
        UserCommand::VolumeUp | UserCommand::VolumeDown => {
            let volume = if command == UserCommand::VolumeUp {
                session.volume().saturating_add(10)
            } else {
                session.volume().saturating_sub(10)
            };
            session.set_volume(volume);
            println!("Volume: {}%", session.volume());
            Ok(())
        }
        UserCommand::Info => {
            print_info(session);
            Ok(())
        }
        UserCommand::Quit => Ok(()),
    };

    if let Err(e) = result {
        println!("{}", e);
    }
}

fn report_event(session: &PlaybackSession<ExternalPlayer>, event: &SessionEvent) {
    match event {
        SessionEvent::ChannelChanged(change) => {
            let name = session.current_channel().map(|c| c.name.as_str()).unwrap_or("?");
            println!(
                "Channel {}/{}: {} ({} source(s))",
                change.channel_index + 1,
                session.channels().len(),
                name,
                change.total_sources
            );
        }
        SessionEvent::SourceChanged(change) if change.total_sources > 1 => {
            println!("Source {}/{}", change.source_index + 1, change.total_sources);
        }
        SessionEvent::SourceChanged(_) => {}
        SessionEvent::StatusChanged(status) => println!("[{}]", status),
        SessionEvent::Probing { index, total } => println!("Checking source {}/{}", index + 1, total),
        SessionEvent::PleaseWait => println!("Switching sources, please wait..."),
        SessionEvent::Exhausted { message } => println!("Offline: {}", message),
    }
}

fn print_info(session: &PlaybackSession<ExternalPlayer>) {
    let snapshot = session.playback_snapshot();
    if let Some(channel) = session.current_channel() {
        println!("{} [{}]", channel.name, channel.group.as_deref().unwrap_or("-"));
    }
    println!(
        "Status: {} | Source {}/{} | Retries: {} | State: {}",
        session.status_text(),
        session.current_source_index() + 1,
        session.total_sources(),
        session.retry_count(),
        snapshot.state
    );
    if let Some(url) = session.last_loaded_url() {
        println!("URL: {}", url);
    }
    if let Some(error) = session.last_error() {
        println!("Last error: {}", error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command("n"), Some(UserCommand::NextChannel));
        assert_eq!(parse_command("S\r\n"), Some(UserCommand::PreviousSource));
        assert_eq!(parse_command(" "), Some(UserCommand::TogglePause));
        assert_eq!(parse_command("+"), Some(UserCommand::VolumeUp));
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("x"), None);
    }

    #[test]
    fn test_args_indices_are_one_based() {
        let args = Args::try_parse_from(["iptv_failover", "list.m3u", "3", "2"]).unwrap();
        assert_eq!(args.playlist, "list.m3u");
        assert_eq!(args.channel_index(), 2);
        assert_eq!(args.source_index(), Some(1));

        let args = Args::try_parse_from(["iptv_failover", "http://example.com/list.m3u"]).unwrap();
        assert_eq!(args.channel_index(), 0);
        assert_eq!(args.source_index(), None);
    }

    #[test]
    fn test_args_reject_bad_input() {
        assert!(Args::try_parse_from(["iptv_failover"]).is_err());
        assert!(Args::try_parse_from(["iptv_failover", "list.m3u", "0"]).is_err());
        assert!(Args::try_parse_from(["iptv_failover", "list.m3u", "1", "0"]).is_err());
        assert!(Args::try_parse_from(["iptv_failover", "list.m3u", "abc"]).is_err());
        assert!(Args::try_parse_from(["iptv_failover", "list.m3u", "--log-level", "loud"]).is_err());
    }

    #[test]
    fn test_args_log_level() {
        let args = Args::try_parse_from(["iptv_failover", "list.m3u", "--log-level", "debug"]).unwrap();
        assert_eq!(args.log_level, LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), Ok(LevelFilter::Warn));
    }

    #[test]
    fn test_args_definition() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
