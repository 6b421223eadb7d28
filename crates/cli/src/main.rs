mod config;
mod error;
mod publish;
mod task;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use mcp::{Framing, Session, ToolSession};
use serde_json::{Map, Value};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{Config, Transport};
use error::{Error, Result};
use publish::PublishRequest;

const CONFIG_FILE: &str = "mcpctl.toml";

#[derive(Parser)]
#[command(name = "mcpctl")]
#[command(about = "Call tools on a remote tool host over stdio or HTTP", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file; ignored when absent
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Tool host base URL (HTTP transport)
    #[arg(long, global = true, conflicts_with = "host_command")]
    url: Option<String>,

    /// Tool host program to spawn (stdio transport)
    #[arg(long = "command", global = true, value_name = "PROGRAM")]
    host_command: Option<String>,

    /// Argument for the spawned program; repeat for several
    #[arg(long = "arg", global = true, value_name = "ARG", allow_hyphen_values = true)]
    host_args: Vec<String>,

    /// The spawned host writes one JSON object per line
    #[arg(long, global = true)]
    lines: bool,

    /// Bearer token for the HTTP transport
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Handshake and default call timeout in seconds
    #[arg(long = "host-timeout", global = true, value_name = "SECS")]
    host_timeout: Option<u64>,

    /// Log protocol traffic at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the capabilities the host declared
    Capabilities,
    /// List the host's tools
    Tools,
    /// Invoke one tool
    Call {
        /// Tool name
        name: String,
        /// Arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
        /// Seconds to wait for the result
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Land a file as a pull request: branch, commit, open PR
    Publish {
        /// File whose contents to publish; a surrounding code fence is stripped
        #[arg(short, long)]
        file: PathBuf,
        #[arg(long)]
        owner: String,
        #[arg(long)]
        repo: String,
        /// Path inside the repository
        #[arg(long)]
        path: Option<String>,
        /// Task description; names the repository path when --path is absent
        #[arg(long)]
        task: Option<String>,
        #[arg(long, default_value = "main")]
        base: String,
        #[arg(long, default_value = "ai-mcp")]
        branch_prefix: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, default_value = "")]
        body: String,
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
        #[arg(long)]
        draft: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// A command with its local inputs already read and validated.
enum Action {
    Capabilities,
    Tools,
    Call {
        name: String,
        arguments: Map<String, Value>,
        timeout: Duration,
    },
    Publish(PublishRequest),
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    let endpoint = config.endpoint()?;
    let timeout = config.timeout();
    // Local input errors surface before a host is spawned.
    let action = prepare(cli.command, timeout)?;
    let session = Session::open(endpoint, config.session_options(cli.token)).await?;

    let result = match action {
        Action::Capabilities => cmd_capabilities(&session),
        Action::Tools => cmd_tools(&session).await,
        Action::Call {
            name,
            arguments,
            timeout,
        } => cmd_call(&session, &name, arguments, timeout).await,
        Action::Publish(request) => cmd_publish(&session, &config, &request, timeout).await,
    };

    session.close().await;
    result
}

fn prepare(command: Commands, default_timeout: Duration) -> Result<Action> {
    match command {
        Commands::Capabilities => Ok(Action::Capabilities),
        Commands::Tools => Ok(Action::Tools),
        Commands::Call {
            name,
            args,
            timeout,
        } => Ok(Action::Call {
            name,
            arguments: parse_arguments(&args)?,
            timeout: timeout.map(Duration::from_secs).unwrap_or(default_timeout),
        }),
        Commands::Publish {
            file,
            owner,
            repo,
            path,
            task: task_text,
            base,
            branch_prefix,
            title,
            body,
            message,
            draft,
        } => {
            let content = std::fs::read_to_string(&file).map_err(|source| Error::ReadFile {
                path: file.clone(),
                source,
            })?;
            let path = path.unwrap_or_else(|| repo_path(&file, task_text.as_deref()));
            let suffix = publish::random_suffix();
            let head = publish::head_branch(&branch_prefix, Local::now(), &suffix);
            Ok(Action::Publish(PublishRequest {
                owner,
                repo,
                content: task::strip_code_fence(&content).to_string(),
                base,
                head,
                title: title.unwrap_or_else(|| format!("AI: {path}")),
                body,
                message: message.unwrap_or_else(|| format!("feat(agent): add {path}")),
                draft,
                path,
            }))
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read the config file when present, then apply command-line overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.config.exists() {
        debug!(path = %cli.config.display(), "loading config");
        Config::load(&cli.config)?
    } else {
        Config::default()
    };

    let host = &mut config.host;
    if let Some(url) = &cli.url {
        host.transport = Some(Transport::Http);
        host.url = Some(url.clone());
    }
    if let Some(command) = &cli.host_command {
        host.transport = Some(Transport::Stdio);
        host.command = Some(command.clone());
        host.args = cli.host_args.clone();
    }
    if cli.lines {
        host.framing = Framing::LineDelimited;
    }
    if let Some(secs) = cli.host_timeout {
        host.timeout_secs = secs;
    }
    Ok(config)
}

fn cmd_capabilities(session: &Session) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(session.capabilities().as_value())?);
    Ok(())
}

async fn cmd_tools(session: &Session) -> Result<()> {
    let tools = session.list_tools().await?;
    if tools.is_empty() {
        println!("No tools found.");
        return Ok(());
    }

    let width = tools.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for tool in tools {
        match tool.description {
            Some(description) => println!("{:<width$}  {}", tool.name, first_line(&description)),
            None => println!("{}", tool.name),
        }
    }
    Ok(())
}

async fn cmd_call(
    session: &Session,
    name: &str,
    arguments: Map<String, Value>,
    timeout: Duration,
) -> Result<()> {
    let result = session.call_tool(name, arguments, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn cmd_publish(
    session: &Session,
    config: &Config,
    request: &PublishRequest,
    timeout: Duration,
) -> Result<()> {
    println!("Branch: {}", request.head);
    println!("Path: {}", request.path);
    let result = publish::publish(session, &config.aliases, request, timeout).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Tool arguments must form a JSON object.
fn parse_arguments(args: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(args)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::InvalidArguments(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

fn repo_path(file: &Path, task_text: Option<&str>) -> String {
    match task_text {
        Some(text) => task::output_name(text),
        None => file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| task::DEFAULT_OUTPUT.to_string()),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default().trim()
}
