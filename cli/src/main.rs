//! dk, the command-line driver for datakit nodes.
//!
//! # Usage
//!
//! ```text
//! dk demo
//! dk tree config.json
//! dk diff new.json old.json
//! dk --settings dk.yaml hash config.json
//! ```

mod demo;
mod parse;

use std::path::Path;
use std::process;

use datakit_core::{settings, Node, Settings};
use tracing_subscriber::EnvFilter;

use parse::{parse_args, Command, USAGE};

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let arg_refs: Vec<&str> = args[1..].iter().map(|s| s.as_str()).collect();

    let invocation = match parse_args(&arg_refs) {
        Ok(inv) => inv,
        Err(e) => {
            eprintln!("dk: {}", e);
            process::exit(1);
        }
    };

    let settings = match &invocation.settings {
        Some(path) => match settings::load(path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("dk: {}", e);
                process::exit(1);
            }
        },
        None => Settings::default(),
    };
    tracing::debug!(command = ?invocation.command, settings = ?settings, "dispatching");

    match execute(invocation.command, settings) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(message) => {
            eprintln!("dk error: {}", message);
            process::exit(1);
        }
    }
}

/// Log to stderr, filtered by `DK_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("DK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn execute(cmd: Command, settings: Settings) -> Result<String, String> {
    match cmd {
        Command::Demo => demo::run(settings).map_err(|e| e.to_string()),
        Command::Tree { file } => {
            let node = load_node(&file, &settings)?;
            let tree = node.to_plain_tree().map_err(|e| e.to_string())?;
            serde_json::to_string_pretty(&tree).map_err(|e| e.to_string())
        }
        Command::Diff { source, baseline } => {
            let source = load_node(&source, &settings)?;
            let baseline = load_node(&baseline, &settings)?;
            let patch = source.diff(&baseline).map_err(|e| e.to_string())?;
            if patch.is_empty() {
                return Ok(patch.summary());
            }
            let tree = patch.to_plain_tree().map_err(|e| e.to_string())?;
            let body = serde_json::to_string_pretty(&tree).map_err(|e| e.to_string())?;
            Ok(format!("{}\n{}", patch.summary(), body))
        }
        Command::Hash { file } => {
            let node = load_node(&file, &settings)?;
            node.freeze().map_err(|e| e.to_string())?;
            let hash = node.structural_hash().map_err(|e| e.to_string())?;
            Ok(format!("{:016x}", hash))
        }
        Command::Help { topic } => Ok(help_text(topic.as_deref())),
    }
}

fn load_node(path: &Path, settings: &Settings) -> Result<Node, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| format!("{}: invalid JSON: {}", path.display(), e))?;
    Node::from_plain_tree_with(&json, settings.clone())
        .map_err(|e| format!("{}: {}", path.display(), e))
}

fn help_text(topic: Option<&str>) -> String {
    let Some(topic) = topic else {
        return USAGE.to_string();
    };
    let lines: Vec<&str> = USAGE
        .lines()
        .filter(|l| l.trim_start().starts_with(topic))
        .collect();
    if lines.is_empty() {
        format!("No help for '{}'.\n\n{}", topic, USAGE)
    } else {
        lines.join("\n")
    }
}
