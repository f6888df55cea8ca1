use std::path::PathBuf;

/// A parsed command line: global options plus the subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub settings: Option<PathBuf>,
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Demo,
    Tree { file: PathBuf },
    Diff { source: PathBuf, baseline: PathBuf },
    Hash { file: PathBuf },
    Help { topic: Option<String> },
}

pub const USAGE: &str = "\
Usage: dk [--settings FILE] <command>

Commands:
  demo                      walk through nodes, transactions, freeze and diff
  tree FILE                 load a JSON object as a node and print its plain tree
  diff SOURCE BASELINE      print the patch that turns BASELINE into SOURCE
  hash FILE                 freeze a JSON object and print its structural hash
  help [command]            show this message

Options:
  --settings FILE           YAML or JSON settings (removal_policy, rollback_events,
                            circular_marker)

Environment:
  DK_LOG                    log filter, e.g. `debug` or `datakit_core=info`";

/// Parse CLI arguments, without the program name.
pub fn parse_args(args: &[&str]) -> Result<Invocation, String> {
    let mut settings = None;
    let mut rest = args;
    while let Some(first) = rest.first() {
        match *first {
            "--settings" => {
                let path = rest
                    .get(1)
                    .ok_or_else(|| "--settings requires a file".to_string())?;
                settings = Some(PathBuf::from(*path));
                rest = &rest[2..];
            }
            flag if flag.starts_with("--settings=") => {
                settings = Some(PathBuf::from(&flag["--settings=".len()..]));
                rest = &rest[1..];
            }
            _ => break,
        }
    }

    if rest.is_empty() {
        return Err("No command specified. Run 'dk help' for usage.".into());
    }

    let command = match rest[0] {
        "demo" => parse_demo(rest),
        "tree" => parse_tree(rest),
        "diff" => parse_diff(rest),
        "hash" => parse_hash(rest),
        "help" | "--help" | "-h" => parse_help(rest),
        _ => Err(format!("Unknown command: '{}'", rest[0])),
    }?;
    Ok(Invocation { settings, command })
}

// ---------------------------------------------------------------------------
// Sub-parsers
// ---------------------------------------------------------------------------

/// `dk demo`
fn parse_demo(args: &[&str]) -> Result<Command, String> {
    if args.len() > 1 {
        return Err("Usage: dk demo".into());
    }
    Ok(Command::Demo)
}

/// `dk tree <file>`
fn parse_tree(args: &[&str]) -> Result<Command, String> {
    if args.len() != 2 {
        return Err("Usage: dk tree <file>".into());
    }
    Ok(Command::Tree {
        file: args[1].into(),
    })
}

/// `dk diff <source> <baseline>`
fn parse_diff(args: &[&str]) -> Result<Command, String> {
    if args.len() != 3 {
        return Err("Usage: dk diff <source> <baseline>".into());
    }
    Ok(Command::Diff {
        source: args[1].into(),
        baseline: args[2].into(),
    })
}

/// `dk hash <file>`
fn parse_hash(args: &[&str]) -> Result<Command, String> {
    if args.len() != 2 {
        return Err("Usage: dk hash <file>".into());
    }
    Ok(Command::Hash {
        file: args[1].into(),
    })
}

/// `dk help [topic]`
fn parse_help(args: &[&str]) -> Result<Command, String> {
    let topic = if args.len() > 1 {
        Some(args[1..].join(" "))
    } else {
        None
    };
    Ok(Command::Help { topic })
}
