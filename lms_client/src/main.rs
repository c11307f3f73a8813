use clap::{Parser, Subcommand};
use lms_client::commands::{call_api, parse_fields, update_profile};
use lms_client::{Role, SessionState, SessionStore};
use lms_common::JsonFileStore;
use lms_http::{ApiClient, ClientConfig};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "lms_client")]
#[command(about = "LMS command-line client")]
struct Cli {
    /// Overrides LMS_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the session.
    Login {
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create an account and sign in as it.
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: String,
        #[arg(short, long, default_value = "student")]
        role: Role,
        /// Extra registration fields as key=value.
        #[arg(long = "field")]
        fields: Vec<String>,
    },
    /// Forget the stored session.
    Logout,
    /// Show the signed-in identity.
    Whoami,
    /// Change fields of the signed-in identity locally.
    Update {
        /// key=value, repeatable.
        #[arg(long = "set", required = true)]
        fields: Vec<String>,
    },
    /// GET a path relative to the API base URL.
    Get { path: String },
    /// POST a JSON body to a path relative to the API base URL.
    Post {
        path: String,
        #[arg(long)]
        json: Option<String>,
    },
    /// DELETE a path relative to the API base URL.
    Delete { path: String },
}

fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::never(lms_common::logs_dir(), "lms_client.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "lms_client=debug,lms_http=debug,info".into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    guard
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let root = lms_common::init_structure()?;
    let _guard = init_tracing();
    info!("Client root: {:?}", root);

    let mut config = ClientConfig::from_env();
    if let Some(url) = cli.api_url {
        config = config.with_base_url(url);
    }
    let base_url = config.normalized_base_url()?;
    let storage = Arc::new(JsonFileStore::for_origin(&base_url));
    let api = ApiClient::new(config, storage)?;
    let session = SessionStore::open(api);

    match cli.command {
        Command::Login { email, password } => {
            let identity = session.login(&email, &password).await?;
            print_json(&serde_json::to_value(identity)?)?;
        }
        Command::Register {
            name,
            email,
            password,
            role,
            fields,
        } => {
            let extra = parse_fields(&fields)?;
            let identity = session
                .register(&name, &email, &password, role, extra)
                .await?;
            print_json(&serde_json::to_value(identity)?)?;
        }
        Command::Logout => session.logout()?,
        Command::Whoami => match session.state() {
            SessionState::Authenticated(identity) => {
                print_json(&serde_json::to_value(identity)?)?
            }
            _ => println!("Not logged in"),
        },
        Command::Update { fields } => print_json(&update_profile(&session, &fields)?)?,
        Command::Get { path } => print_json(&call_api(&session, "GET", &path, None).await?)?,
        Command::Post { path, json } => {
            let body: Value = match json {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Value::Object(Default::default()),
            };
            print_json(&call_api(&session, "POST", &path, Some(&body)).await?)?
        }
        Command::Delete { path } => {
            print_json(&call_api(&session, "DELETE", &path, None).await?)?
        }
    }

    Ok(())
}
