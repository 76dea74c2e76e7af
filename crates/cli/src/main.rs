use clap::{Parser, Subcommand};
use lib::pipeline::{Pipeline, TicketInput};
use lib::respond::TicketStatus;

#[derive(Parser)]
#[command(name = "tickets")]
#[command(about = "Support ticket pipeline CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the HTTP gateway (POST /tickets). Dispatch is always simulated.
    Serve {
        /// Config file path (default: TICKETS_CONFIG_PATH or ~/.tickets/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP port (default from config or 8085)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Process a single message through the pipeline and print the response.
    Process {
        /// The support request text.
        message: String,

        /// Pre-supplied surname.
        #[arg(long)]
        name: Option<String>,

        /// Pre-supplied given name.
        #[arg(long)]
        vorname: Option<String>,

        /// Pre-supplied email address.
        #[arg(long)]
        email: Option<String>,

        /// Post to the configured dispatch endpoint instead of simulating.
        #[arg(long)]
        live: bool,

        /// Config file path (default: TICKETS_CONFIG_PATH or ~/.tickets/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },

    /// Interactive session: messages share one conversation token, so a
    /// ticket parked for missing contact details resumes on the identity reply.
    Chat {
        /// Config file path (default: TICKETS_CONFIG_PATH or ~/.tickets/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("tickets {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Process {
            message,
            name,
            vorname,
            email,
            live,
            config,
        }) => {
            if let Err(e) = run_process(message, name, vorname, email, live, config).await {
                log::error!("processing failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat { config }) => {
            if let Err(e) = run_chat(config).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let mut config = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config).await
}

async fn run_process(
    message: String,
    name: Option<String>,
    vorname: Option<String>,
    email: Option<String>,
    live: bool,
    config_path: Option<std::path::PathBuf>,
) -> anyhow::Result<()> {
    let mut config = lib::config::load_config(config_path)?;
    if live {
        config.dispatch.simulate = false;
    }
    let pipeline = Pipeline::from_config(&config, !live);

    let input = TicketInput {
        message,
        name,
        vorname,
        email,
        ..TicketInput::default()
    };
    let response = pipeline.run(input).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_chat(config_path: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    use std::io::{self, Write};

    let config = lib::config::load_config(config_path)?;
    let pipeline = Pipeline::from_config(&config, true);
    let token = uuid::Uuid::new_v4().to_string();
    log::debug!("chat session token {}", token);

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let ticket = TicketInput {
            message: input.to_string(),
            session_token: Some(token.clone()),
            ..TicketInput::default()
        };
        match pipeline.run(ticket).await {
            Ok(response) => {
                println!("< {}", response.message.trim());
                if response.status == TicketStatus::Completed {
                    if let Some(payload) = &response.payload {
                        println!(
                            "  [{} / {}]",
                            payload.kategorie.as_deref().unwrap_or("-"),
                            payload.email.as_deref().unwrap_or("-")
                        );
                    }
                }
            }
            Err(e) => {
                eprintln!("chat error: {}", e);
            }
        }
    }

    Ok(())
}
