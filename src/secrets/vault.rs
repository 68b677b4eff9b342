//! Vault 파일 I/O 및 암호화/복호화
//!
//! 파일 포맷 (v1):
//! - magic: `CHATSEC1` (8 bytes)
//! - nonce: 24 bytes (XChaCha20-Poly1305)
//! - ciphertext: AEAD 결과 (= 암호문 + 태그)
//!
//! magic는 AAD로 묶여 있어 헤더만 바꿔치기한 파일은 복호화에 실패합니다.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use zeroize::Zeroize;

/// 파일 매직 (8 bytes)
pub const VAULT_MAGIC: &[u8; 8] = b"CHATSEC1";

/// 마스터키 길이 (256-bit)
pub const MASTER_KEY_LEN: usize = 32;

/// Nonce 길이 (XChaCha20-Poly1305용 24 bytes)
pub const NONCE_LEN: usize = 24;

const VAULT_FILE_NAME: &str = "secrets.vault";

/// Vault 오류
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid vault magic")]
    InvalidMagic,

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Vault에 저장되는 시크릿 페이로드
///
/// 키는 로컬 저장소 키 이름 그대로 사용:
/// - `openai_api_key`
/// - `system_instructions`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsPayload {
    pub secrets: HashMap<String, String>,
    #[serde(default = "default_version")]
    pub version: u32,
}

impl Default for SecretsPayload {
    fn default() -> Self {
        Self {
            secrets: HashMap::new(),
            version: default_version(),
        }
    }
}

fn default_version() -> u32 {
    1
}

/// 마스터키를 사용해 페이로드를 암호화하고 vault 파일에 저장
pub fn encrypt_and_write(
    path: &Path,
    master_key: &[u8; MASTER_KEY_LEN],
    payload: &SecretsPayload,
) -> Result<(), VaultError> {
    let mut plaintext = serde_json::to_vec(payload)?;

    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill(&mut nonce);

    let cipher = XChaCha20Poly1305::new(master_key.into());
    let result = cipher.encrypt(
        XNonce::from_slice(&nonce),
        Payload {
            msg: &plaintext,
            aad: VAULT_MAGIC,
        },
    );
    plaintext.zeroize();
    let ciphertext = result.map_err(|e| VaultError::EncryptionFailed(e.to_string()))?;

    // Atomic write: 임시 파일에 쓰고 rename
    let tmp_path = path.with_extension("vault.tmp");

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(VAULT_MAGIC)?;
    file.write_all(&nonce)?;
    file.write_all(&ciphertext)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp_path, path)?;

    Ok(())
}

/// Vault 파일을 읽고 마스터키로 복호화
pub fn read_and_decrypt(
    path: &Path,
    master_key: &[u8; MASTER_KEY_LEN],
) -> Result<SecretsPayload, VaultError> {
    let mut file = fs::File::open(path)?;

    let mut magic = [0u8; 8];
    file.read_exact(&mut magic)?;
    if &magic != VAULT_MAGIC {
        return Err(VaultError::InvalidMagic);
    }

    let mut nonce = [0u8; NONCE_LEN];
    file.read_exact(&mut nonce)?;

    let mut ciphertext = Vec::new();
    file.read_to_end(&mut ciphertext)?;

    let cipher = XChaCha20Poly1305::new(master_key.into());
    let mut plaintext = cipher
        .decrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: &ciphertext,
                aad: VAULT_MAGIC,
            },
        )
        .map_err(|e| VaultError::DecryptionFailed(e.to_string()))?;

    let parsed = serde_json::from_slice::<SecretsPayload>(&plaintext);

    // 평문 메모리 지우기
    plaintext.zeroize();

    Ok(parsed?)
}

/// 디렉토리 기준 vault 경로
pub fn get_vault_path(dir: &Path) -> PathBuf {
    dir.join(VAULT_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn random_key() -> [u8; MASTER_KEY_LEN] {
        let mut key = [0u8; MASTER_KEY_LEN];
        rand::thread_rng().fill(&mut key);
        key
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let dir = tempdir().unwrap();
        let vault_path = get_vault_path(dir.path());
        let master_key = random_key();

        let mut payload = SecretsPayload::default();
        payload
            .secrets
            .insert("openai_api_key".to_string(), "sk-test123".to_string());
        payload
            .secrets
            .insert("system_instructions".to_string(), "be nice".to_string());

        encrypt_and_write(&vault_path, &master_key, &payload).unwrap();
        assert!(vault_path.exists());
        assert!(!vault_path.with_extension("vault.tmp").exists());

        let decrypted = read_and_decrypt(&vault_path, &master_key).unwrap();
        assert_eq!(decrypted.version, 1);
        assert_eq!(
            decrypted.secrets.get("openai_api_key"),
            Some(&"sk-test123".to_string())
        );
        assert_eq!(
            decrypted.secrets.get("system_instructions"),
            Some(&"be nice".to_string())
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let dir = tempdir().unwrap();
        let vault_path = get_vault_path(dir.path());

        encrypt_and_write(&vault_path, &random_key(), &SecretsPayload::default()).unwrap();

        let result = read_and_decrypt(&vault_path, &random_key());
        assert!(matches!(result, Err(VaultError::DecryptionFailed(_))));
    }

    #[test]
    fn test_foreign_magic_rejected() {
        let dir = tempdir().unwrap();
        let vault_path = get_vault_path(dir.path());
        fs::write(&vault_path, b"ITESECR1-not-ours-at-all-000000000000").unwrap();

        let result = read_and_decrypt(&vault_path, &random_key());
        assert!(matches!(result, Err(VaultError::InvalidMagic)));
    }
}
