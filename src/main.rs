use campus_events::campus::HttpStore;
use campus_events::notify::NotificationKind;
use campus_events::poll::Ticker;
use campus_events::{App, Config, Session, SessionStore};
use chrono::Utc;
use color_eyre::eyre::{eyre, Result};
use tokio::signal::ctrl_c;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const EMAIL_ENV: &str = "CAMPUS_EMAIL";
const PASSWORD_ENV: &str = "CAMPUS_PASSWORD";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    info!("Connecting to {}", config.api_base_url);

    let store = match &config.session_path {
        Some(path) => SessionStore::at(path),
        None => SessionStore::in_memory(),
    };
    let session = Session::load(store)?;
    let api = HttpStore::new(&config)?;
    let mut app = App::new(api, session, config.timezone.clone());

    if !app.restore().await? {
        let (email, password) = credentials()?;
        app.sign_in(&email, &password).await?;
    }
    if let Some(user) = app.user() {
        info!("Watching notifications for {} every {}s", user.name, config.poll_interval_secs);
    }

    let mut ticker = Ticker::every_secs(config.poll_interval_secs);
    loop {
        // Ctrl-C also cancels a poll that is still waiting on the server.
        tokio::select! {
            _ = async {
                ticker.tick().await;
                poll(&mut app).await;
            } => {}
            signal = ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Failed to listen for Ctrl-C: {e}");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn poll(app: &mut App<HttpStore>) {
    if !app.session.is_authenticated() {
        match app.restore().await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Session expired, set {EMAIL_ENV} and {PASSWORD_ENV} and restart");
                return;
            }
            Err(e) => {
                error!("Failed to restore session: {e}");
                return;
            }
        }
    }

    app.refresh_events().await;
    for notification in app.refresh_notifications(Utc::now()).await {
        match notification.kind {
            NotificationKind::Event => {
                info!("{}: {}", notification.title, notification.message)
            }
            NotificationKind::Comment => {
                info!("{} {}", notification.title, notification.message)
            }
        }
    }
    info!("{} unread", app.bell.unread());
}

fn credentials() -> Result<(String, String)> {
    match (std::env::var(EMAIL_ENV), std::env::var(PASSWORD_ENV)) {
        (Ok(email), Ok(password)) => Ok((email, password)),
        _ => Err(eyre!(
            "No saved session; set {EMAIL_ENV} and {PASSWORD_ENV} to sign in"
        )),
    }
}
