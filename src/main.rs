use anyhow::Result;
use convoybot::bot::{Bot, ChatRequest, SEGMENT_DELAY};
use convoybot::cache::NameCache;
use convoybot::capabilities::Capabilities;
use convoybot::config::BotConfig;
use convoybot::instance::{InstanceLock, LockOutcome};
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
};
use tracing::{error, info};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let mut config_path: Option<PathBuf> = None;
    let mut oneshot: Option<String> = None;
    let mut user = "console".to_string();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                if let Some(path) = args.next() {
                    config_path = Some(PathBuf::from(path));
                } else {
                    eprintln!("--config requires a path");
                }
            }
            "--command" => {
                if let Some(command) = args.next() {
                    oneshot = Some(command);
                } else {
                    eprintln!("--command requires a command name");
                }
            }
            "--user" | "-u" => {
                if let Some(name) = args.next() {
                    user = name;
                }
            }
            "--help" | "-h" => {
                println!("convoybot");
                println!("  --config <path>    Use an explicit config file");
                println!("  --command <name>   Run one command and exit (e.g. mods)");
                println!("  --user <name>      User name for --command and the console");
                return Ok(());
            }
            _ => {}
        }
    }

    let config = BotConfig::load(config_path.as_deref())?;
    let caps = Capabilities::detect();
    let cache_path = config.cache_path()?;

    let lock = InstanceLock::new(config.lock_path()?);
    match lock.acquire(caps.pid_probe)? {
        LockOutcome::AlreadyRunning { pid } => {
            error!(pid, "another bot instance is running");
            std::process::exit(1);
        }
        LockOutcome::StaleCleaned => info!("recovered from stale instance marker"),
        LockOutcome::Acquired => {}
    }

    let cache = Arc::new(NameCache::load(cache_path));
    let mut bot = Bot::new(config, cache, caps);

    let result = match oneshot {
        Some(command) => run_once(&mut bot, &user, &command),
        None => run_console(&mut bot, &user),
    };

    lock.release();
    result
}

fn run_once(bot: &mut Bot, user: &str, command: &str) -> Result<()> {
    let request = ChatRequest {
        user: user.to_string(),
        command: command.trim_start_matches('!').to_string(),
    };
    send_segments(bot.dispatch(&request))
}

// Local stand-in for the chat transport: one command per stdin line.
fn run_console(bot: &mut Bot, user: &str) -> Result<()> {
    let commands = bot.known_commands().join(", ");
    println!("convoybot console. commands: {commands} (quit to exit)");

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        // "<user> <command>" or bare "<command>".
        let (request_user, command) = match trimmed.split_once(char::is_whitespace) {
            Some((name, command)) => (name.to_string(), command.trim()),
            None => (user.to_string(), trimmed),
        };
        let request = ChatRequest {
            user: request_user,
            command: command.trim_start_matches('!').to_string(),
        };
        send_segments(bot.dispatch(&request))?;
    }
    Ok(())
}

fn send_segments(segments: Vec<String>) -> Result<()> {
    let count = segments.len();
    for (index, segment) in segments.into_iter().enumerate() {
        println!("{segment}");
        io::stdout().flush()?;
        if index + 1 < count {
            std::thread::sleep(SEGMENT_DELAY);
        }
    }
    Ok(())
}
