//! 로컬 시크릿 저장소 모듈
//!
//! Master Key + Encrypted Vault 구조로 API 키와 시스템 지시문을 보관합니다.
//!
//! - Keychain에는 마스터키 1개만 저장 (`chat:master_key_v1`)
//! - 나머지 시크릿은 `<vault_dir>/secrets.vault` 파일에 AEAD로 암호화하여 저장
//! - 런타임에는 메모리 캐시로 보관

pub mod manager;
pub mod store;
pub mod vault;

pub use manager::LocalVault;
pub use store::LocalSecretStore;
