use chrono::Utc;
use std::path::PathBuf;
use std::time::Duration;
use subtrends_core::{CachedToken, CoreError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Single-slot OAuth token file shared by every client in the process.
///
/// Reads, writes and removals are serialized by one async lock. Writes go to a
/// sibling temp file that is renamed over the target, so a concurrent reader
/// in another process sees either the old token or the new one.
#[derive(Debug)]
pub struct TokenCache {
    path: PathBuf,
    expiry_buffer: Duration,
    lock: Mutex<()>,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>, expiry_buffer: Duration) -> Self {
        Self {
            path: path.into(),
            expiry_buffer,
            lock: Mutex::new(()),
        }
    }

    pub fn expiry_buffer(&self) -> Duration {
        self.expiry_buffer
    }

    /// The cached token if the file exists, parses, and is still valid.
    pub async fn get(&self) -> Option<CachedToken> {
        let _guard = self.lock.lock().await;

        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Token cache file does not exist");
                return None;
            }
            Err(e) => {
                warn!("Failed to read token cache {}: {}", self.path.display(), e);
                return None;
            }
        };

        let token: CachedToken = match serde_json::from_str(&contents) {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to parse token cache: {}", e);
                return None;
            }
        };

        if token.is_valid(self.expiry_buffer) {
            debug!(
                "Using cached token (expires in {}s)",
                (token.expires_at - Utc::now()).num_seconds()
            );
            Some(token)
        } else {
            debug!("Cached token has expired");
            None
        }
    }

    /// Replaces whatever is cached with a token expiring `expires_in` from now.
    pub async fn set(
        &self,
        access_token: &str,
        expires_in: Duration,
    ) -> Result<CachedToken, CoreError> {
        let _guard = self.lock.lock().await;
        let token = CachedToken::new(access_token, expires_in);

        if let Err(e) = self.write_atomic(&token).await {
            error!("Failed to write token cache {}: {}", self.path.display(), e);
            return Err(e);
        }

        info!("Token cached successfully (expires in {}s)", expires_in.as_secs());
        Ok(token)
    }

    pub async fn clear(&self) -> Result<(), CoreError> {
        let _guard = self.lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Token cache cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::Io(e)),
        }
    }

    async fn write_atomic(&self, token: &CachedToken) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(token)?;
        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .await?;
        }

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(CoreError::Io(e));
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "token".into());
        name.push(format!(".{}.tmp", std::process::id()));
        self.path.with_file_name(name)
    }
}
