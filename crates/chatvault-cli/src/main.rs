//! chatvault CLI - branchable LLM chat sessions

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chatvault_core::export::ExportFormat;
use chatvault_core::models::{Message, MergeOptions, MergeType, MessageRole};
use chatvault_core::{Backend, BackendRegistry, Config};
use clap::{Parser, Subcommand};

mod pretty;

#[derive(Debug, Parser)]
#[command(
    name = "chatvault",
    author,
    version,
    about = "Branchable LLM chat session storage",
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "CHATVAULT_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an empty session
    New {
        /// Session name
        name: String,

        /// Model name
        #[arg(long)]
        model: Option<String>,

        /// Model provider
        #[arg(long)]
        provider: Option<String>,

        /// System prompt
        #[arg(long)]
        system: Option<String>,

        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// List sessions, most recently updated first
    List {
        /// Only sessions carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Maximum results
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a session transcript
    Show {
        /// Session ID
        id: String,

        /// Print the raw JSON record
        #[arg(long)]
        json: bool,
    },

    /// Append a message to a session
    Add {
        /// Session ID
        id: String,

        /// Message role (user, assistant, system)
        role: String,

        /// Message content
        content: String,
    },

    /// Fork a session at a message index
    Branch {
        /// Parent session ID
        id: String,

        /// Number of leading messages to keep
        #[arg(long)]
        at: usize,

        /// Branch name
        #[arg(long)]
        name: String,
    },

    /// List the branches of a session
    Children {
        /// Session ID
        id: String,
    },

    /// Show the branch tree rooted at a session
    Tree {
        /// Root session ID
        id: String,
    },

    /// Merge one session into another
    Merge {
        /// Session receiving the messages
        target: String,

        /// Session providing the messages
        source: String,

        /// Merge strategy
        #[arg(long, value_enum, default_value = "continuation")]
        strategy: StrategyArg,

        /// Source message indices for cherry-pick
        #[arg(long, value_delimiter = ',')]
        pick: Vec<usize>,

        /// Put the merged history on a new branch of the target
        #[arg(long)]
        branch: Option<String>,
    },

    /// Search names, prompts, messages and tags
    Search {
        /// Search query
        query: String,

        /// Characters of context on each side of a hit
        #[arg(long)]
        radius: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a session
    Export {
        /// Session ID
        id: String,

        /// Output format (json, markdown)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a session
    Delete {
        /// Session ID
        id: String,
    },

    /// Add or remove a tag
    Tag {
        /// Session ID
        id: String,

        #[arg(value_enum)]
        action: TagAction,

        /// Tag
        tag: String,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum StrategyArg {
    Continuation,
    Rebase,
    CherryPick,
}

impl From<StrategyArg> for MergeType {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::Continuation => MergeType::Continuation,
            StrategyArg::Rebase => MergeType::Rebase,
            StrategyArg::CherryPick => MergeType::CherryPick,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum TagAction {
    Add,
    Remove,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let registry = BackendRegistry::with_defaults();
    let backend = registry
        .create(&config.storage)
        .context("opening session store")?;
    let backend = backend.as_ref();

    match cli.command {
        Command::New {
            name,
            model,
            provider,
            system,
            tags,
        } => cmd_new(backend, &name, model, provider, system, tags),
        Command::List { tag, limit } => cmd_list(backend, tag.as_deref(), limit),
        Command::Show { id, json } => cmd_show(backend, &id, json),
        Command::Add { id, role, content } => cmd_add(backend, &id, &role, content),
        Command::Branch { id, at, name } => cmd_branch(backend, &id, at, &name),
        Command::Children { id } => cmd_children(backend, &id),
        Command::Tree { id } => cmd_tree(backend, &id),
        Command::Merge {
            target,
            source,
            strategy,
            pick,
            branch,
        } => cmd_merge(backend, &target, &source, strategy, pick, branch),
        Command::Search {
            query,
            radius,
            json,
        } => {
            let mut options = config.search_options();
            if let Some(radius) = radius {
                options.snippet_radius = radius;
            }
            cmd_search(backend, &query, &options, json)
        }
        Command::Export { id, format, output } => cmd_export(backend, &id, &format, output),
        Command::Delete { id } => cmd_delete(backend, &id),
        Command::Tag { id, action, tag } => cmd_tag(backend, &id, action, &tag),
    }
}

fn cmd_new(
    backend: &dyn Backend,
    name: &str,
    model: Option<String>,
    provider: Option<String>,
    system: Option<String>,
    tags: Vec<String>,
) -> Result<()> {
    let mut session = backend.new_session(name);
    if model.is_some() || provider.is_some() {
        session.set_model(model.unwrap_or_default(), provider.unwrap_or_default());
    }
    if let Some(prompt) = system {
        session.set_system_prompt(prompt);
    }
    for tag in tags {
        session.add_tag(tag);
    }
    backend.save(&mut session)?;
    println!("{}", session.id);
    Ok(())
}

fn cmd_list(backend: &dyn Backend, tag: Option<&str>, limit: Option<usize>) -> Result<()> {
    let infos: Vec<_> = backend
        .list()?
        .into_iter()
        .filter(|info| tag.is_none_or(|t| info.tags.iter().any(|have| have == t)))
        .take(limit.unwrap_or(usize::MAX))
        .collect();
    pretty::print_session_list(&infos);
    Ok(())
}

fn cmd_show(backend: &dyn Backend, id: &str, json: bool) -> Result<()> {
    let session = backend.load(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        pretty::print_session(&session);
    }
    Ok(())
}

fn cmd_add(backend: &dyn Backend, id: &str, role: &str, content: String) -> Result<()> {
    let role: MessageRole = role.parse()?;
    let mut session = backend.load(id)?;
    session.add_message(Message::new(role, content));
    backend.update(&mut session)?;
    println!("{} messages", session.message_count());
    Ok(())
}

fn cmd_branch(backend: &dyn Backend, id: &str, at: usize, name: &str) -> Result<()> {
    let branch = backend.create_branch(id, at, name)?;
    println!("{}", branch.id);
    Ok(())
}

fn cmd_children(backend: &dyn Backend, id: &str) -> Result<()> {
    let children = backend.get_children(id)?;
    pretty::print_session_list(&children);
    Ok(())
}

fn cmd_tree(backend: &dyn Backend, id: &str) -> Result<()> {
    let tree = backend.get_branch_tree(id)?;
    pretty::print_tree(&tree);
    Ok(())
}

fn cmd_merge(
    backend: &dyn Backend,
    target: &str,
    source: &str,
    strategy: StrategyArg,
    pick: Vec<usize>,
    branch: Option<String>,
) -> Result<()> {
    let mut options = MergeOptions::new(strategy.into()).pick(pick);
    if let Some(name) = branch {
        options = options.into_branch(name);
    }

    let result = backend.merge_sessions(target, source, &options)?;
    match &result.new_branch_id {
        Some(branch_id) => println!(
            "Merged {} message(s) ({}) into new branch {branch_id}",
            result.merged_count, result.merge_type
        ),
        None => println!(
            "Merged {} message(s) ({}) into {target}",
            result.merged_count, result.merge_type
        ),
    }
    Ok(())
}

fn cmd_search(
    backend: &dyn Backend,
    query: &str,
    options: &chatvault_core::search::SearchOptions,
    json: bool,
) -> Result<()> {
    let results = backend.search_with(query, options)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        pretty::print_search_results(&results, query.trim());
    }
    Ok(())
}

fn cmd_export(
    backend: &dyn Backend,
    id: &str,
    format: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let format: ExportFormat = format.parse()?;
    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            backend.export(id, format, &mut writer)?;
            writer.flush()?;
            eprintln!("Exported {id} to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            backend.export(id, format, &mut lock)?;
        }
    }
    Ok(())
}

fn cmd_delete(backend: &dyn Backend, id: &str) -> Result<()> {
    backend.delete(id)?;
    println!("Deleted session: {id}");
    Ok(())
}

fn cmd_tag(backend: &dyn Backend, id: &str, action: TagAction, tag: &str) -> Result<()> {
    let mut session = backend.load(id)?;
    match action {
        TagAction::Add => session.add_tag(tag),
        TagAction::Remove => session.remove_tag(tag),
    }
    backend.update(&mut session)?;
    println!("Tags: {}", session.tags.join(", "));
    Ok(())
}
