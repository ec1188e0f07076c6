use clap::Parser;
use log::{info, warn};

use jwch_login::captcha::StdinSolver;
use jwch_login::endpoints::Endpoints;
use jwch_login::network_client::{self, NetworkError};

// Custom Application Error Type
#[derive(Debug)]
enum AppError {
    Network(NetworkError),
    Io(std::io::Error),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Network(err) => write!(f, "Network error: {}", err),
            AppError::Io(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Network(err) => Some(err),
            AppError::Io(err) => Some(err),
        }
    }
}

impl From<NetworkError> for AppError {
    fn from(err: NetworkError) -> Self {
        AppError::Network(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(NetworkError::Reqwest(err))
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Student number (the portal's `muser`)
    #[clap(value_parser)]
    student_id: String,

    /// Portal password
    #[clap(value_parser)]
    password: String,

    /// Where to write the CAPTCHA image for reading
    #[clap(long, default_value = "photo.jpg")]
    captcha_file: String,

    /// Print the fetched student information page to stdout
    #[clap(long)]
    html: bool,

    /// Probe the keepalive endpoint after login
    #[clap(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let args = Args::parse();
    env_logger::init();

    let client = network_client::build_client()?;
    let endpoints = Endpoints::default();
    let solver = StdinSolver::new(&args.captcha_file);

    info!("Starting login for student {}", args.student_id);
    let mut session = network_client::login(
        &client,
        &endpoints,
        &solver,
        &args.student_id,
        &args.password,
    )
    .await?;

    if args.check {
        match network_client::check_session(&client, &endpoints, &mut session).await {
            Ok(()) => info!("Session confirmed live by keepalive probe"),
            Err(NetworkError::SessionExpired) => {
                warn!("Keepalive probe reports the session already expired")
            }
            Err(err) => return Err(err.into()),
        }
    }

    let page = network_client::fetch_student_info(&client, &endpoints, &mut session).await?;

    if args.html {
        // The page itself is the requested output, not a log line.
        println!("{}", page);
    } else {
        println!("Login complete. Session id: {}", session.user_id);
    }

    Ok(())
}
