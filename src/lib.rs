//! chat-secrets - 로컬 시크릿 → 클라우드 설정 마이그레이션 라이브러리
//!
//! 로컬 암호화 vault에 저장된 제공자 API 키와 시스템 지시문을
//! 사용자 계정의 클라우드 설정 저장소로 옮기고, 확인된 뒤에만 로컬 사본을 지웁니다.

pub mod cloud;
pub mod config;
pub mod error;
pub mod migration;
pub mod models;
pub mod secrets;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use cloud::{CloudSecretStore, CloudSettingsClient};
pub use config::{AppConfig, CloudConfig, ConfigError};
pub use error::{MigrationIssue, StoreError};
pub use migration::MigrationCoordinator;
pub use models::{
    BackupResult, ClearResult, FullMigrationResult, MigrationResult, MigrationStatus, Provider,
    RestoreResult, SecretKey, UserSecrets, ValidationResult,
};
pub use secrets::{LocalSecretStore, LocalVault};

/// tracing 구독자 설치 (`RUST_LOG`가 없으면 `chat_secrets=info`)
///
/// 이미 설치되어 있으면 아무것도 하지 않습니다.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chat_secrets=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// 환경 설정으로 Keychain 기반 vault와 클라우드 클라이언트를 묶은 코디네이터 생성
pub fn coordinator_from_config(config: &AppConfig) -> Result<MigrationCoordinator, StoreError> {
    let local = LocalVault::open_with_keychain(&config.vault_dir)?;
    let cloud = CloudSettingsClient::from_config(&config.cloud)?;
    Ok(MigrationCoordinator::new(Arc::new(local), Arc::new(cloud)))
}
