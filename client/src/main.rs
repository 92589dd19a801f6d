//! Headless hire notifier: restores or opens a session, then raises an alert
//! for every hire event until interrupted.

use color_eyre::eyre::{Context, Result, eyre};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use gigflow_client::app::{ClientParts, build};
use gigflow_client::config::{ClientSettings, LOGIN_PASSWORD_ENV, login_password};
use gigflow_client::domain::{LoginCredentials, SessionStore};
use ortho_config::OrthoConfig;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings =
        ClientSettings::load().map_err(|err| eyre!("failed to load settings: {err}"))?;
    let ClientParts { store, channel } = build(&settings).wrap_err("failed to build client")?;
    let handle = channel.spawn(store.subscribe());

    if store.bootstrap().await.is_err() {
        sign_in(&store, &settings).await;
    }

    tokio::signal::ctrl_c()
        .await
        .wrap_err("failed to listen for ctrl-c")?;
    info!("shutting down");
    handle.shutdown().await;
    Ok(())
}

/// Sign in with the configured email and the password from the environment.
/// Failures are logged; the notifier keeps waiting for a session either way.
async fn sign_in(store: &SessionStore, settings: &ClientSettings) {
    let Some(email) = settings.login_email() else {
        info!("no session and no login email configured; waiting signed out");
        return;
    };
    let Some(password) = login_password() else {
        warn!(variable = LOGIN_PASSWORD_ENV, "login email set without a password");
        return;
    };
    let credentials = match LoginCredentials::try_from_parts(email, password.as_str()) {
        Ok(credentials) => credentials,
        Err(error) => {
            warn!(error = %error, "invalid login settings");
            return;
        }
    };
    if let Err(error) = store.authenticate(&credentials).await {
        warn!(error = %error, "sign-in failed");
    }
}
