//! simpleai - terminal client for SimpleAI.
//!
//! Reads messages from stdin, one per line, and prints whatever the model
//! answers: text, or references to the generated images.

mod render;

use clap::Parser;
use simpleai_core::interrogate::{image_ref_from_path, is_supported_image_ref};
use simpleai_core::{AppController, Config, DispatchOutcome};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "simpleai", version, about = "Chat with a model that answers in text or images")]
struct Args {
    /// Base URL of the text, image and interrogate endpoints
    #[arg(long, env = "SIMPLEAI_API_BASE")]
    api_base: Option<String>,

    /// Number of past turns sent with every message
    #[arg(long, env = "SIMPLEAI_HISTORY_WINDOW")]
    history_window: Option<usize>,

    /// Timeout for each remote request, in seconds
    #[arg(long, env = "SIMPLEAI_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Write a transcript of every prompt and completion to this directory
    #[arg(long, env = "SIMPLEAI_TRANSCRIPT_DIR")]
    transcript_dir: Option<PathBuf>,

    /// Send a single message, print the answer and exit
    #[arg(long, short)]
    prompt: Option<String>,
}

impl Args {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(api_base) = &self.api_base {
            config.api_base = api_base.clone();
        }
        if let Some(window) = self.history_window {
            config.history_window = window;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(dir) = &self.transcript_dir {
            config.transcript_dir = Some(dir.clone());
        }
        config
    }
}

/// One line of REPL input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Submit(String),
    /// Draft text that is sent once typing stops.
    Type(String),
    Drop(Vec<String>),
    Clear,
    Restore,
    History(Option<usize>),
    State,
    Quit,
    Empty,
    Unknown(String),
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.is_empty() {
        return Command::Empty;
    }
    if !line.starts_with('/') {
        return Command::Submit(line.to_string());
    }

    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or_default();
    match name {
        "/type" => Command::Type(line[name.len()..].trim().to_string()),
        "/drop" => Command::Drop(parts.map(str::to_string).collect()),
        "/clear" => Command::Clear,
        "/restore" => Command::Restore,
        "/history" => match parts.next().map(str::parse::<usize>) {
            None => Command::History(None),
            Some(Ok(n)) => Command::History(Some(n)),
            Some(Err(_)) => Command::Unknown(line.to_string()),
        },
        "/state" => Command::State,
        "/quit" | "/exit" => Command::Quit,
        _ => Command::Unknown(name.to_string()),
    }
}

/// Turn a `/drop` argument into something the captioner accepts: URLs and
/// data URIs pass through, anything else is read as a local file.
fn resolve_image(arg: &str) -> Result<String, Box<dyn Error>> {
    if is_supported_image_ref(arg) {
        return Ok(arg.to_string());
    }
    Ok(image_ref_from_path(Path::new(arg))?)
}

async fn drop_images(controller: &AppController, args: &[String]) {
    if args.is_empty() {
        eprintln!("usage: /drop <path or url>...");
        return;
    }
    let mut images = Vec::new();
    for arg in args {
        match resolve_image(arg) {
            Ok(image) => images.push(image),
            Err(e) => eprintln!("Skipping {}: {}", arg, e),
        }
    }
    for turn in controller.drop_images(&images).await.into_iter().flatten() {
        println!("added: {}", turn.payload());
    }
}

fn print_history(controller: &AppController, n: Option<usize>) {
    let history = &controller.stores().history;
    let turns = match n {
        Some(n) => history.last_items(n),
        None => history.items(),
    };
    if turns.is_empty() {
        println!("(no history)");
    }
    for turn in turns {
        println!("User: {}\n{}: {}", turn.user(), turn.kind(), turn.payload());
    }
}

async fn one_shot(controller: &AppController, text: &str) -> Result<(), Box<dyn Error>> {
    match controller.submit(text).await? {
        Some(DispatchOutcome::Assistant(reply)) => println!("{reply}"),
        Some(DispatchOutcome::Generation(artifacts)) => {
            for line in render::artifact_lines(&artifacts) {
                println!("{line}");
            }
        }
        None => log::warn!("Nothing to send"),
    }
    Ok(())
}

async fn repl(controller: &AppController) -> Result<(), Box<dyn Error>> {
    let renderer = render::spawn(controller.subscribe());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        match parse_command(&line) {
            Command::Empty => {}
            Command::Submit(text) => {
                // Not awaited here: a newer message supersedes a slow one.
                let controller = controller.clone();
                tokio::spawn(async move {
                    let _ = controller.submit(&text).await;
                });
            }
            Command::Type(text) => {
                controller.focus_prompt();
                controller.edit_prompt(&text);
            }
            Command::Drop(args) => drop_images(controller, &args).await,
            Command::Clear => controller.clear_artifacts(),
            Command::Restore => {
                if controller.restore_last_turn().is_none() {
                    println!("(no history)");
                }
            }
            Command::History(n) => print_history(controller, n),
            Command::State => {
                println!("{}", serde_json::to_string_pretty(&controller.snapshot())?);
            }
            Command::Quit => break,
            Command::Unknown(name) => eprintln!("Unknown command: {name}"),
        }
    }

    controller.cancel_pending_submit();
    renderer.abort();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = args.config();
    log::info!("Using API at {}", config.api_base);

    let controller = AppController::builder().config(config).build();
    log::info!("Session {}", controller.session_id());

    let result = match &args.prompt {
        Some(text) => one_shot(&controller, text).await,
        None => repl(&controller).await,
    };
    if let Err(e) = &result {
        log::error!("{}", e);
    }
    result
}
