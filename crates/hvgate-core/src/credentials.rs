//! Persistence of the application instance.
//!
//! The on-disk format is three newline-terminated lines, in order:
//!
//! ```text
//! app_id
//! base64_shared_secret
//! creation_token
//! ```

use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::crypto::{b64_decode, b64_encode};
use crate::error::{Error, Result};
use crate::session::AppInstance;

/// Loads and saves the application instance.
pub trait CredentialStore: Send + Sync {
    /// Load the stored instance, or `None` if nothing is stored yet.
    fn load(&self) -> Result<Option<AppInstance>>;

    /// Store an instance, replacing any previous one.
    fn save(&self, app: &AppInstance) -> Result<()>;
}

/// [`CredentialStore`] backed by a three-line text file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Create a store at `path`. Nothing is read until [`CredentialStore::load`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Encode an instance in the three-line format.
pub fn encode_app_instance(app: &AppInstance) -> String {
    format!(
        "{}\n{}\n{}\n",
        app.app_id,
        b64_encode(&app.shared_secret),
        app.creation_token
    )
}

/// Decode the three-line format. Trailing whitespace on each line is ignored.
pub fn decode_app_instance(text: &str) -> std::result::Result<AppInstance, String> {
    let mut lines = text.lines().map(str::trim_end);
    let mut next = |what: &str| {
        lines
            .next()
            .filter(|line| !line.is_empty())
            .ok_or_else(|| format!("missing {} line", what))
    };
    let app_id = next("app id")?;
    let secret = next("shared secret")?;
    let token = next("creation token")?;
    let secret = b64_decode(secret).map_err(|e| e.to_string())?;
    Ok(AppInstance::new(app_id, secret, token))
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<AppInstance>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                debug!("No credential file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(Error::credentials(&self.path, e.to_string())),
        };
        let app =
            decode_app_instance(&text).map_err(|message| Error::credentials(&self.path, message))?;
        debug!(
            "Loaded app instance {} from {}",
            app.app_id,
            self.path.display()
        );
        Ok(Some(app))
    }

    fn save(&self, app: &AppInstance) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| Error::credentials(parent, e.to_string()))?;
        }
        fs::write(&self.path, encode_app_instance(app))
            .map_err(|e| Error::credentials(&self.path, e.to_string()))?;
        info!(
            "Saved app instance {} to {}",
            app.app_id,
            self.path.display()
        );
        Ok(())
    }
}
