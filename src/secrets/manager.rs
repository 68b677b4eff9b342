//! Local Vault - 마스터키 관리 및 시크릿 캐시
//!
//! - 마스터키는 Keychain에서 1회 로드 (`chat:master_key_v1`)
//! - 시크릿은 메모리 캐시로 보관
//! - 변경 시 vault 파일 업데이트

use crate::error::StoreError;
use crate::secrets::store::LocalSecretStore;
use crate::secrets::vault::{
    encrypt_and_write, get_vault_path, read_and_decrypt, SecretsPayload, MASTER_KEY_LEN,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use keyring::Entry;
use rand::Rng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

/// Keychain 서비스 이름
const KEYCHAIN_SERVICE: &str = "com.chat-secrets.app";
/// 마스터키 Keychain 키
const MASTER_KEY_KEYCHAIN_KEY: &str = "chat:master_key_v1";

/// Zeroize가 적용된 마스터키 래퍼
struct MasterKey {
    bytes: [u8; MASTER_KEY_LEN],
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

/// 암호화된 vault 파일 기반 로컬 시크릿 저장소
pub struct LocalVault {
    master_key: MasterKey,
    vault_path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
    /// 열 때 복호화하지 못한 vault 파일이 남아 있음 (첫 쓰기 전에 백업)
    unreadable: AtomicBool,
}

impl LocalVault {
    /// 주어진 마스터키로 vault를 연다
    ///
    /// vault 파일이 있으면 복호화하여 캐시에 로드합니다.
    /// 복호화에 실패하면 빈 캐시로 시작합니다. 기존 파일은 다음 쓰기 직전에
    /// `secrets.vault.bak`으로 복사한 뒤 덮어씁니다.
    pub fn open(dir: &Path, master_key: [u8; MASTER_KEY_LEN]) -> Self {
        let vault_path = get_vault_path(dir);
        let master_key = MasterKey { bytes: master_key };

        let mut unreadable = false;
        let secrets = if vault_path.exists() {
            match read_and_decrypt(&vault_path, &master_key.bytes) {
                Ok(payload) => {
                    info!(count = payload.secrets.len(), "Vault loaded");
                    payload.secrets
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %vault_path.display(),
                        "Failed to load vault, starting fresh"
                    );
                    unreadable = true;
                    HashMap::new()
                }
            }
        } else {
            debug!(path = %vault_path.display(), "No existing vault, starting fresh");
            HashMap::new()
        };

        Self {
            master_key,
            vault_path,
            cache: RwLock::new(secrets),
            unreadable: AtomicBool::new(unreadable),
        }
    }

    /// Keychain의 마스터키로 vault를 연다 (없으면 생성하고 저장)
    pub fn open_with_keychain(dir: &Path) -> Result<Self, StoreError> {
        let master_key = match load_master_key_from_keychain()? {
            Some(key) => {
                info!("Master key loaded from keychain");
                key
            }
            None => {
                info!("No master key found, generating new one");
                let key = generate_master_key();
                save_master_key_to_keychain(&key)?;
                key
            }
        };
        Ok(Self::open(dir, master_key))
    }

    pub fn vault_path(&self) -> &Path {
        &self.vault_path
    }

    /// 복호화하지 못한 기존 vault를 덮어쓰기 전에 남겨두는 경로
    pub fn backup_path(&self) -> PathBuf {
        self.vault_path.with_extension("vault.bak")
    }

    /// 읽지 못한 vault 파일을 `.bak`으로 복사 (한 번만)
    fn preserve_unreadable(&self) -> Result<(), StoreError> {
        if !self.unreadable.load(Ordering::SeqCst) {
            return Ok(());
        }
        if self.vault_path.exists() {
            let backup = self.backup_path();
            std::fs::copy(&self.vault_path, &backup)?;
            warn!(
                backup = %backup.display(),
                "Overwriting unreadable vault, previous file kept as backup"
            );
        }
        self.unreadable.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// 캐시 상태를 vault 파일에 저장
    fn persist(&self, cache: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.vault_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.preserve_unreadable()?;

        let payload = SecretsPayload {
            secrets: cache.clone(),
            ..SecretsPayload::default()
        };
        encrypt_and_write(&self.vault_path, &self.master_key.bytes, &payload)?;
        Ok(())
    }
}

#[async_trait]
impl LocalSecretStore for LocalVault {
    async fn retrieve(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.cache.read().await.get(key).cloned())
    }

    async fn store(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // 쓰기 락을 persist까지 유지해야 파일과 캐시가 어긋나지 않음
        let mut cache = self.cache.write().await;
        let previous = cache.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&cache) {
            match previous {
                Some(prev) => cache.insert(key.to_string(), prev),
                None => cache.remove(key),
            };
            return Err(e);
        }
        debug!(key, "Secret stored");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut cache = self.cache.write().await;
        let Some(previous) = cache.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&cache) {
            cache.insert(key.to_string(), previous);
            return Err(e);
        }
        debug!(key, "Secret removed");
        Ok(())
    }

    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .cache
            .read()
            .await
            .get(key)
            .is_some_and(|value| !value.trim().is_empty()))
    }
}

/// 마스터키 생성 (CSPRNG)
fn generate_master_key() -> [u8; MASTER_KEY_LEN] {
    let mut key = [0u8; MASTER_KEY_LEN];
    rand::thread_rng().fill(&mut key);
    key
}

/// Keychain에서 마스터키 로드 (엔트리가 없으면 `None`)
fn load_master_key_from_keychain() -> Result<Option<[u8; MASTER_KEY_LEN]>, StoreError> {
    let entry = Entry::new(KEYCHAIN_SERVICE, MASTER_KEY_KEYCHAIN_KEY)
        .map_err(|e| StoreError::Keychain(e.to_string()))?;

    let mut password = match entry.get_password() {
        Ok(password) => password,
        Err(keyring::Error::NoEntry) => return Ok(None),
        Err(e) => return Err(StoreError::Keychain(e.to_string())),
    };

    let decoded = BASE64.decode(&password);
    password.zeroize();
    let mut bytes = decoded.map_err(|_| StoreError::InvalidMasterKey)?;

    if bytes.len() != MASTER_KEY_LEN {
        bytes.zeroize();
        return Err(StoreError::InvalidMasterKey);
    }

    let mut key = [0u8; MASTER_KEY_LEN];
    key.copy_from_slice(&bytes);
    bytes.zeroize();

    Ok(Some(key))
}

/// Keychain에 마스터키 저장
fn save_master_key_to_keychain(key: &[u8; MASTER_KEY_LEN]) -> Result<(), StoreError> {
    let entry = Entry::new(KEYCHAIN_SERVICE, MASTER_KEY_KEYCHAIN_KEY)
        .map_err(|e| StoreError::Keychain(e.to_string()))?;

    let mut encoded = BASE64.encode(key);
    let result = entry.set_password(&encoded);
    encoded.zeroize();

    result.map_err(|e| StoreError::Keychain(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_store_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let key = generate_master_key();

        let vault = LocalVault::open(dir.path(), key);
        vault.store("openai_api_key", "sk-1").await.unwrap();
        vault.store("system_instructions", "be nice").await.unwrap();
        assert!(vault.vault_path().exists());
        drop(vault);

        let reopened = LocalVault::open(dir.path(), key);
        assert_eq!(
            reopened.retrieve("openai_api_key").await.unwrap(),
            Some("sk-1".to_string())
        );
        assert!(reopened.has("system_instructions").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_noop() {
        let dir = tempdir().unwrap();
        let vault = LocalVault::open(dir.path(), generate_master_key());

        vault.remove("google_api_key").await.unwrap();
        assert!(!vault.vault_path().exists());
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let dir = tempdir().unwrap();
        let key = generate_master_key();

        let vault = LocalVault::open(dir.path(), key);
        vault.store("xai_api_key", "xai-1").await.unwrap();
        vault.remove("xai_api_key").await.unwrap();
        drop(vault);

        let reopened = LocalVault::open(dir.path(), key);
        assert_eq!(reopened.retrieve("xai_api_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_whitespace_value_is_not_present() {
        let dir = tempdir().unwrap();
        let vault = LocalVault::open(dir.path(), generate_master_key());
        vault.store("anthropic_api_key", "   ").await.unwrap();

        assert!(!vault.has("anthropic_api_key").await.unwrap());
    }

    #[tokio::test]
    async fn test_unreadable_vault_starts_empty() {
        let dir = tempdir().unwrap();
        let vault = LocalVault::open(dir.path(), generate_master_key());
        vault.store("openai_api_key", "sk-1").await.unwrap();
        drop(vault);

        // 다른 마스터키로 열면 복호화 실패 → 빈 캐시
        let other = LocalVault::open(dir.path(), generate_master_key());
        assert_eq!(other.retrieve("openai_api_key").await.unwrap(), None);
        assert!(!other.backup_path().exists());
    }

    #[tokio::test]
    async fn test_unreadable_vault_is_kept_before_overwrite() {
        let dir = tempdir().unwrap();
        let original_key = generate_master_key();
        let vault = LocalVault::open(dir.path(), original_key);
        vault.store("openai_api_key", "sk-1").await.unwrap();
        drop(vault);

        let other = LocalVault::open(dir.path(), generate_master_key());
        other.store("anthropic_api_key", "ak-2").await.unwrap();
        other.store("google_api_key", "g-3").await.unwrap();

        // 원래 키로 .bak을 복호화할 수 있어야 함
        let kept = read_and_decrypt(&other.backup_path(), &original_key).unwrap();
        assert_eq!(kept.secrets.get("openai_api_key").map(String::as_str), Some("sk-1"));
        assert!(!kept.secrets.contains_key("anthropic_api_key"));

        drop(other);
        assert!(read_and_decrypt(&get_vault_path(dir.path()), &original_key).is_err());
    }

    #[tokio::test]
    async fn test_failed_persist_rolls_back_cache() {
        let dir = tempdir().unwrap();
        // vault 경로의 부모를 파일로 만들어 create_dir_all을 실패시킴
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let vault = LocalVault::open(&blocker.join("nested"), generate_master_key());

        assert!(vault.store("openai_api_key", "sk-1").await.is_err());
        assert_eq!(vault.retrieve("openai_api_key").await.unwrap(), None);
    }
}
