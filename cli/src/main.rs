use std::sync::Arc;

use anyhow::Context;
use anyhow::bail;
use clap::Parser;
use clap::Subcommand;
use opsdeck_core::BackendClient;
use opsdeck_core::Config;
use opsdeck_core::LineKind;
use opsdeck_core::OutputLine;
use opsdeck_core::SessionGuard;
use opsdeck_core::StreamController;
use opsdeck_core::StreamUpdate;
use opsdeck_core::client::CommandArgs;
use opsdeck_core::config::API_KEY_ENV_VAR;
use opsdeck_core::interactive::parse_argument_token;
use opsdeck_core::stream::SseTransport;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "opsdeck",
    version,
    about = "Operator console for backend deploy and container commands"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in with the configured API key.
    Login,
    /// Show the current backend session state.
    Status,
    /// List the command identifiers the backend exposes.
    Commands,
    /// Run a command and stream its live output.
    Run {
        command_id: String,
        /// Command argument, repeatable: -a key=value
        #[arg(short = 'a', long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,
        /// Trigger the command without streaming its output.
        #[arg(long)]
        detach: bool,
    },
    /// Open the interactive terminal viewer.
    Tui,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;
    if !matches!(cli.command, Command::Tui) {
        init_logging();
    }

    match cli.command {
        Command::Login => run_login(&config).await,
        Command::Status => run_status(&config).await,
        Command::Commands => run_commands(&config).await,
        Command::Run {
            command_id,
            args,
            detach,
        } => run_run(&config, &command_id, &args, detach).await,
        Command::Tui => opsdeck_tui::run_main(config)
            .await
            .map_err(|err| anyhow::anyhow!("{err}")),
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run_login(config: &Config) -> anyhow::Result<()> {
    let guard = SessionGuard::new(BackendClient::new(config), config.api_key.clone());
    if guard.login().await {
        let session = guard.session();
        eprintln!(
            "Logged in (session {})",
            session.session_id.as_deref().unwrap_or("unknown")
        );
        Ok(())
    } else {
        bail!("login failed; set {API_KEY_ENV_VAR} to a valid key");
    }
}

async fn run_status(config: &Config) -> anyhow::Result<()> {
    let guard = SessionGuard::new(BackendClient::new(config), config.api_key.clone());
    let session = guard.check_status().await;
    if session.authenticated {
        eprintln!(
            "Authenticated (session {})",
            session.session_id.as_deref().unwrap_or("unknown")
        );
        Ok(())
    } else {
        eprintln!("Not authenticated");
        std::process::exit(1);
    }
}

async fn run_commands(config: &Config) -> anyhow::Result<()> {
    let client = BackendClient::new(config);
    for command_id in client.list_commands().await? {
        println!("{command_id}");
    }
    Ok(())
}

async fn run_run(
    config: &Config,
    command_id: &str,
    raw_args: &[String],
    detach: bool,
) -> anyhow::Result<()> {
    let arguments = parse_cli_args(raw_args)?;
    let client = BackendClient::new(config);

    let guard = SessionGuard::new(client.clone(), config.api_key.clone());
    if !guard.check_status().await.authenticated && !guard.login().await {
        eprintln!("Not authenticated; set {API_KEY_ENV_VAR}");
        std::process::exit(1);
    }

    if detach {
        client.run_command(command_id, &arguments).await?;
        eprintln!("Command {command_id} triggered");
        return Ok(());
    }

    let mut controller = StreamController::new(
        Arc::new(SseTransport::new(client)),
        config.persist_output,
    );
    controller.start(command_id, arguments)?;
    loop {
        match controller.next_update().await {
            StreamUpdate::LineAppended(line) => print_line(&line),
            StreamUpdate::StateChanged(_) => {}
            StreamUpdate::Finished { success } => {
                if !success {
                    std::process::exit(1);
                }
                return Ok(());
            }
        }
    }
}

fn parse_cli_args(raw_args: &[String]) -> anyhow::Result<CommandArgs> {
    let mut arguments = CommandArgs::new();
    for token in raw_args {
        let Some((key, value)) = parse_argument_token(token) else {
            bail!("invalid argument `{token}`; expected KEY=VALUE");
        };
        arguments.insert(key, value);
    }
    Ok(arguments)
}

fn print_line(line: &OutputLine) {
    if supports_color::on(supports_color::Stream::Stdout).is_none() {
        println!("{}", line.text);
        return;
    }
    match line.kind {
        LineKind::Error => println!("{}", line.text.red()),
        LineKind::Success => println!("{}", line.text.green()),
        LineKind::Warning => println!("{}", line.text.yellow()),
        LineKind::Info | LineKind::Notice => println!("{}", line.text.cyan()),
        LineKind::Stdout | LineKind::Plain => println!("{}", line.text),
    }
}
