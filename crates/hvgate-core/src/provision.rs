//! Application instance provisioning and client bootstrap.

use std::sync::Arc;

use tracing::info;

use crate::client::{Client, post_request};
use crate::clock::now_utc_string;
use crate::credentials::CredentialStore;
use crate::envelope;
use crate::error::{Error, Result};
use crate::session::AppInstance;
use crate::transport::Transport;

/// Ask the service for a new application instance.
///
/// The request is identified only by `master_app_id`. A nonzero reply code
/// is [`Error::Provisioning`]. The caller is responsible for persisting
/// the result.
pub async fn provision(
    transport: &dyn Transport,
    host: &str,
    master_app_id: &str,
) -> Result<AppInstance> {
    info!("Provisioning a new app instance from {}", master_app_id);
    let body = envelope::app_creation_request(master_app_id, &now_utc_string());
    let reply = post_request(transport, host, body).await?;
    if !reply.is_ok() {
        return Err(Error::Provisioning { code: reply.code() });
    }
    let app = reply.app_instance()?;
    info!("Provisioned app instance {}", app.app_id);
    Ok(app)
}

/// Load the stored application instance, provisioning and saving one if
/// the store is empty.
pub async fn ensure_app_instance(
    store: &dyn CredentialStore,
    transport: &dyn Transport,
    host: &str,
    master_app_id: &str,
) -> Result<AppInstance> {
    if let Some(app) = store.load()? {
        return Ok(app);
    }
    let app = provision(transport, host, master_app_id).await?;
    store.save(&app)?;
    Ok(app)
}

/// [`ensure_app_instance`] followed by [`Client::open`].
pub async fn ensure_client(
    store: &dyn CredentialStore,
    transport: Arc<dyn Transport>,
    host: &str,
    master_app_id: &str,
) -> Result<Client> {
    let app = ensure_app_instance(store, transport.as_ref(), host, master_app_id).await?;
    Client::open(transport, host, app).await
}
