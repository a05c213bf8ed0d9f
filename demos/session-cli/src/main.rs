//! bearer-session CLI demo
//!
//! Logs in against a token-issuing API, stores the credentials on disk and
//! sends authenticated requests. Expired access tokens are refreshed once
//! no matter how many requests hit a 401 at the same time.
//!
//! Run with: cargo run -p bearer-session-cli -- --help

mod config;

use bearer_session::callbacks::FnLoginRedirect;
use bearer_session::{
    ClientConfig, Navigation, RefreshError, RouteGuard, SessionClient, SessionError,
};
use clap::{Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "bearer-session")]
#[command(about = "Log in, call an API and keep the bearer session alive")]
struct Args {
    /// API base URL (falls back to API_BASE_URL, then http://localhost:8000)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Credentials file
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange username and password for a token pair
    Login {
        /// Account name, usually an email address
        #[arg(long, short = 'u')]
        username: String,

        /// Password (falls back to BEARER_SESSION_PASSWORD)
        #[arg(long, short = 'p')]
        password: Option<String>,
    },
    /// GET a path and print the response body
    Get {
        /// Path relative to the base URL
        path: String,

        /// Send this many requests concurrently
        #[arg(long, short = 'n', default_value = "1")]
        concurrency: usize,
    },
    /// Check whether navigation to a path would be allowed
    Guard {
        /// Application route, e.g. /cart
        path: String,
    },
    /// Show the stored session
    Status,
    /// Clear the stored session
    Logout,
}

fn paint(text: &str, ok: bool) -> String {
    if config::no_color() {
        text.to_string()
    } else if ok {
        style(text).green().to_string()
    } else {
        style(text).red().to_string()
    }
}

fn build_client(args: &Args) -> anyhow::Result<SessionClient> {
    let mut client_config = ClientConfig::from_env();
    if let Some(ref base_url) = args.base_url {
        client_config.base_url = base_url.clone();
    }
    let store = config::credentials_store(args.credentials.clone());
    tracing::debug!(path = %store.path().display(), "Using credentials file");

    let client = SessionClient::builder()
        .config(client_config)
        .store(Arc::new(store))
        .redirect(Arc::new(FnLoginRedirect::new(|| {
            eprintln!(
                "{} session expired, run `bearer-session login` again",
                paint("!", false)
            );
        })))
        .build()?;
    Ok(client)
}

async fn get(client: &SessionClient, path: &str, concurrency: usize) -> anyhow::Result<()> {
    let requests = (0..concurrency.max(1)).map(|_| client.send(client.get(path)));
    let results = futures::future::join_all(requests).await;

    for (i, result) in results.into_iter().enumerate() {
        match result {
            Ok(response) => {
                let status = response.status();
                let body = response.text().await?;
                println!("[{i}] {} {body}", paint(status.as_str(), status.is_success()));
            }
            Err(SessionError::Refresh(RefreshError::NoRefreshToken)) => {
                println!("[{i}] {} not logged in", paint("error", false));
            }
            Err(e) => {
                println!("[{i}] {} {e}", paint("error", false));
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Override with RUST_LOG env var for more detail
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bearer_session=info,warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let client = build_client(&args)?;

    match args.command {
        Command::Login {
            ref username,
            ref password,
        } => {
            let password = password
                .clone()
                .or_else(config::password_from_env)
                .ok_or_else(|| {
                    anyhow::anyhow!("no password given; use --password or {}", config::PASSWORD_ENV)
                })?;
            match client.login(username, &password).await {
                Ok(_) => println!("{} logged in as {username}", paint("ok", true)),
                Err(SessionError::LoginRejected { message, .. }) => {
                    println!("{} {message}", paint("rejected", false));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Command::Get {
            ref path,
            concurrency,
        } => get(&client, path, concurrency).await?,
        Command::Guard { ref path } => {
            match RouteGuard::default().check(path, client.store().as_ref())? {
                Navigation::Proceed => println!("{} {path}", paint("proceed", true)),
                Navigation::Redirect(to) => println!("{} {to}", paint("redirect", false)),
            }
        }
        Command::Status => {
            if client.is_authenticated() {
                println!("{} authenticated", paint("ok", true));
            } else {
                println!("{} not logged in", paint("-", false));
            }
            println!("base url: {}", client.config().base_url);
        }
        Command::Logout => {
            client.logout();
            println!("{} logged out", paint("ok", true));
        }
    }

    Ok(())
}
