use clap::{Parser, Subcommand};
use lib::channels::SlackChannel;
use lib::config::{BootMode, Credentials};
use lib::llm::OpenAiClient;

#[derive(Parser)]
#[command(name = "chatbridge")]
#[command(about = "Relay Slack mentions and direct chat requests to a completion API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the webhook gateway. Requires MODE, AUTH_SECRET, OPENAI_API_KEY and SLACK_API_TOKEN.
    Serve {
        /// Config file path (default: CHATBRIDGE_CONFIG_PATH or ~/.chatbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8080)
        #[arg(long, short)]
        port: Option<u16>,

        /// Bind address (default from config or 127.0.0.1)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },

    /// Send one message to the completion API, print the reply and post it to the debug channel (DEBUG_SLACK_CH_ID) when set.
    Probe {
        /// Config file path (default: CHATBRIDGE_CONFIG_PATH or ~/.chatbridge/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Message to send
        #[arg(long, short, default_value = lib::probe::DEFAULT_PROBE_MESSAGE)]
        message: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("chatbridge {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port, bind }) => {
            let credentials = boot();
            if let Err(e) = run_serve(credentials, config, port, bind).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Probe { config, message }) => {
            let credentials = boot();
            if let Err(e) = run_probe(credentials, config, message).await {
                log::error!("probe failed: {:#}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

/// Initialize logging for the boot mode and resolve credentials; exits on any configuration error.
fn boot() -> Credentials {
    let mode = std::env::var(lib::config::ENV_MODE)
        .unwrap_or_default()
        .parse::<BootMode>()
        .unwrap_or_default();
    init_logging(mode);
    log::info!("boot mode: {}", mode);

    match Credentials::from_env() {
        Ok(c) => c,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// dev/local log at debug, prod at info; RUST_LOG overrides either.
fn init_logging(mode: BootMode) {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(mode.default_log_filter()),
    )
    .init();
}

async fn run_serve(
    credentials: Credentials,
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
) -> anyhow::Result<()> {
    let (mut config, path) = lib::config::load_config(config_path)?;
    log::debug!("configuration loaded from {}", path.display());
    if let Some(p) = port {
        config.gateway.port = p;
    }
    if let Some(b) = bind {
        config.gateway.bind = b;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config, credentials).await
}

async fn run_probe(
    credentials: Credentials,
    config_path: Option<std::path::PathBuf>,
    message: String,
) -> anyhow::Result<()> {
    let (config, _) = lib::config::load_config(config_path)?;
    let completer = OpenAiClient::new(&config.completion, credentials.openai_api_key.clone());
    let channel = SlackChannel::new(
        Some(config.slack.api_base.clone()),
        credentials.slack_api_token.clone(),
    );
    let debug_channel = lib::config::resolve_debug_channel(&config);
    log::info!("probe: model {}", completer.model());

    let report =
        lib::probe::run_probe(&completer, &channel, debug_channel.as_deref(), &message).await?;
    println!("{}", report.reply);
    Ok(())
}
