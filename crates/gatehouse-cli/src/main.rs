mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gatehouse_auth::{init_logging, AuthConfig, AuthService, LoggingConfig};

#[derive(Parser)]
#[command(name = "gatehouse")]
#[command(about = "Manage gatehouse user stores")]
struct Cli {
    /// User file to operate on (defaults to USERS_FILE or `.users`)
    #[arg(long, global = true)]
    users_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new user
    Register {
        /// Username
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Optional role stored with the user
        #[arg(long)]
        role: Option<String>,
    },

    /// List registered users
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a username/password pair against the user file
    Check {
        /// Username
        username: String,

        /// Password (read from stdin when omitted)
        #[arg(long)]
        password: Option<String>,
    },

    /// Generate a random session secret
    GenerateSecret,
}

fn load_service(users_file: Option<PathBuf>) -> anyhow::Result<AuthService> {
    let mut config = AuthConfig::from_env()?;
    init_logging(LoggingConfig::for_environment(config.environment))?;

    if let Some(path) = users_file {
        config.store.path = path;
    }
    Ok(AuthService::from_config(config)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Register {
            username,
            password,
            role,
        } => {
            let service = load_service(cli.users_file)?;
            let password = commands::password_or_stdin(password)?;
            println!("{}", commands::register(&service, &username, &password, role).await?);
        }
        Commands::Users { json } => {
            let service = load_service(cli.users_file)?;
            println!("{}", commands::list_users(&service, json).await?);
        }
        Commands::Check { username, password } => {
            let service = load_service(cli.users_file)?;
            let password = commands::password_or_stdin(password)?;
            let (message, accepted) = commands::check(&service, &username, &password).await?;
            println!("{}", message);
            if !accepted {
                std::process::exit(1);
            }
        }
        Commands::GenerateSecret => {
            println!("{}", commands::generate_secret());
        }
    }

    Ok(())
}
