use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rest_kit::{rest_client, CallFuture, ClientConfig, Executor};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Serialize, Deserialize)]
pub struct Todo {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Serialize)]
pub struct NewTodo {
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("no such todo: {0}")]
pub struct TodoMissing(String);

impl From<String> for TodoMissing {
    fn from(message: String) -> Self {
        TodoMissing(message)
    }
}

#[rest_client(prefix = "/todos", consumes = "application/json")]
pub trait TodoApi {
    #[request(GET)]
    fn list(&self, #[query("_page")] page: Option<u32>) -> rest_kit::Result<Vec<Todo>>;

    #[request(GET, "/{id}", status(404 => TodoMissing))]
    fn get(&self, #[path] id: u64) -> rest_kit::Result<Todo>;

    #[request(POST)]
    fn create(&self, #[body] todo: &NewTodo) -> rest_kit::Result<CallFuture<Todo>>;
}

/// Talks to a JSON todo service through a generated rest_kit client.
#[derive(Debug, Parser)]
#[command(name = "todo-cli", version, about)]
struct Cli {
    /// Base URL of the todo service.
    #[arg(long, env = "API_URL")]
    url: Option<String>,

    /// TOML client configuration; `--url` overrides its base URL.
    #[arg(long, env = "TODO_CLI_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List todos.
    List {
        #[arg(long)]
        page: Option<u32>,
    },
    /// Show one todo.
    Get { id: u64 },
    /// Create a todo.
    Add {
        title: String,
        #[arg(long)]
        done: bool,
    },
}

fn executor(cli: &Cli) -> Result<Executor> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &cli.url {
        config.default_base_url = Some(url.clone());
    }
    if config.default_base_url.is_none() && config.base_urls.is_empty() {
        anyhow::bail!("no base URL: pass --url, set API_URL or provide --config");
    }
    Ok(Executor::from_config(&config)?)
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,rest_kit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let api = TodoApiClient::new(executor(&cli)?).context("invalid TodoApi declaration")?;

    match cli.command {
        Command::List { page } => {
            for todo in api.list(page)? {
                let mark = if todo.completed { "x" } else { " " };
                println!("[{}] {:>4}  {}", mark, todo.id, todo.title);
            }
        }
        Command::Get { id } => {
            let todo = api.get(id)?;
            println!("{}", serde_json::to_string_pretty(&todo)?);
        }
        Command::Add { title, done } => {
            let pending = api.create(&NewTodo {
                title,
                completed: done,
            })?;
            tracing::info!("create request dispatched");
            let todo = pending.get()?;
            println!("created #{}", todo.id);
        }
    }
    Ok(())
}
