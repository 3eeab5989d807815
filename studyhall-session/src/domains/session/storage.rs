//! Encrypted local storage for session data
//!
//! Device-bound encrypted storage for the token, cached user and push token
//! without requiring OS-level secret services or keychains. Each key lives in
//! its own `<key>.enc` file next to a random wrap key (`store.key`).

use std::path::{Path, PathBuf};

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, AeadCore, KeyInit, OsRng},
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use zeroize::Zeroizing;

use crate::domains::session::errors::{StorageError, StorageResult};
use crate::infra::services::store::{SecureStore, StorageKey};

pub(crate) const WRAP_KEY_FILE: &str = "store.key";
const ENVELOPE_VERSION: u32 = 1;
const KEY_INFO: &[u8] = b"studyhall-secure-store-v1";
const NONCE_SIZE: usize = 12;

/// Encrypted value with metadata
#[derive(Debug, Serialize, Deserialize)]
struct EncryptedEntry {
    /// Base64 encoded nonce
    nonce: String,
    /// Base64 encoded encrypted data
    ciphertext: String,
    /// When this data was encrypted
    encrypted_at: DateTime<Utc>,
    /// Version for future compatibility
    version: u32,
}

/// File-backed [`SecureStore`] with AES-256-GCM encrypted entries.
pub struct EncryptedFileStore {
    dir: PathBuf,
    key: OnceCell<Key<Aes256Gcm>>,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("dir", &self.dir)
            .field("key_loaded", &self.key.initialized())
            .finish()
    }
}

impl EncryptedFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            key: OnceCell::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: StorageKey) -> PathBuf {
        self.dir.join(format!("{}.enc", key.as_str()))
    }

    async fn cipher(&self) -> StorageResult<Aes256Gcm> {
        let key = self
            .key
            .get_or_try_init(|| self.load_or_create_key())
            .await?;
        Ok(Aes256Gcm::new(key))
    }

    /// Load the wrap key, creating it on first use, and derive the data key.
    async fn load_or_create_key(&self) -> StorageResult<Key<Aes256Gcm>> {
        let wrap_path = self.dir.join(WRAP_KEY_FILE);
        let wrap_key = if tokio::fs::try_exists(&wrap_path)
            .await
            .map_err(StorageError::ReadFailed)?
        {
            let bytes = Zeroizing::new(
                tokio::fs::read(&wrap_path)
                    .await
                    .map_err(StorageError::ReadFailed)?,
            );
            if bytes.len() != 32 {
                return Err(StorageError::InitFailed(format!(
                    "wrap key {} has unexpected length {}",
                    wrap_path.display(),
                    bytes.len()
                )));
            }
            bytes
        } else {
            debug!(
                "[EncryptedFileStore] Creating wrap key at {}",
                wrap_path.display()
            );
            let key =
                Zeroizing::new(Aes256Gcm::generate_key(&mut OsRng).to_vec());
            tokio::fs::create_dir_all(&self.dir)
                .await
                .map_err(StorageError::WriteFailed)?;
            tokio::fs::write(&wrap_path, key.as_slice())
                .await
                .map_err(StorageError::WriteFailed)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let mut perms = tokio::fs::metadata(&wrap_path)
                    .await
                    .map_err(StorageError::WriteFailed)?
                    .permissions();
                perms.set_mode(0o600);
                tokio::fs::set_permissions(&wrap_path, perms)
                    .await
                    .map_err(StorageError::WriteFailed)?;
            }
            key
        };

        // Derive encryption key from wrap key via HKDF-SHA256
        let hk = hkdf::Hkdf::<sha2::Sha256>::new(None, &wrap_key);
        let mut okm = Zeroizing::new([0u8; 32]);
        hk.expand(KEY_INFO, okm.as_mut_slice())
            .map_err(|_| StorageError::InitFailed("HKDF expand failed".into()))?;
        Ok(*Key::<Aes256Gcm>::from_slice(okm.as_slice()))
    }

    fn seal(cipher: &Aes256Gcm, plaintext: &str) -> anyhow::Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;
        let entry = EncryptedEntry {
            nonce: BASE64.encode(nonce),
            ciphertext: BASE64.encode(ciphertext),
            encrypted_at: Utc::now(),
            version: ENVELOPE_VERSION,
        };
        serde_json::to_string_pretty(&entry)
            .context("Failed to serialize encrypted entry")
    }

    fn open(cipher: &Aes256Gcm, data: &str) -> anyhow::Result<String> {
        let entry: EncryptedEntry = serde_json::from_str(data)
            .context("Failed to parse encrypted entry")?;
        if entry.version != ENVELOPE_VERSION {
            return Err(anyhow!(
                "Unsupported entry version {}",
                entry.version
            ));
        }
        let nonce_bytes =
            BASE64.decode(&entry.nonce).context("Invalid nonce encoding")?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(anyhow!("Invalid nonce length {}", nonce_bytes.len()));
        }
        let ciphertext = BASE64
            .decode(&entry.ciphertext)
            .context("Invalid ciphertext encoding")?;
        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
                .map_err(|e| anyhow!("Decryption failed: {}", e))?,
        );
        String::from_utf8(plaintext.to_vec())
            .context("Decrypted entry is not valid UTF-8")
    }

    async fn discard_corrupt(&self, key: StorageKey, err: &anyhow::Error) {
        warn!(
            "[EncryptedFileStore] Discarding unreadable entry {}: {:#}",
            key.as_str(),
            err
        );
        if let Err(e) = tokio::fs::remove_file(self.entry_path(key)).await {
            debug!(
                "[EncryptedFileStore] Failed to remove {}: {}",
                key.as_str(),
                e
            );
        }
    }
}

#[async_trait]
impl SecureStore for EncryptedFileStore {
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        let path = self.entry_path(key);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(None);
            }
            Err(e) => return Err(StorageError::ReadFailed(e)),
        };

        let cipher = self.cipher().await?;
        match Self::open(&cipher, &data) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.discard_corrupt(key, &err).await;
                Ok(None)
            }
        }
    }

    async fn set(&self, key: StorageKey, value: &str) -> StorageResult<()> {
        let cipher = self.cipher().await?;
        let sealed =
            Self::seal(&cipher, value).map_err(StorageError::EncryptionFailed)?;

        let path = self.entry_path(key);
        let tmp = path.with_extension("enc.tmp");
        tokio::fs::write(&tmp, sealed)
            .await
            .map_err(StorageError::WriteFailed)?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(StorageError::WriteFailed)?;
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> StorageResult<()> {
        match tokio::fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::WriteFailed(e)),
        }
    }
}
