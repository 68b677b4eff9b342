//! 로컬 → 클라우드 시크릿 마이그레이션
//!
//! 로컬 암호화 저장소와 클라우드 설정 저장소를 모두 다루는 유일한 지점입니다.
//! 순서는 항상 "클라우드 기록 → (검증) → 로컬 삭제"이며, 클라우드 기록이
//! 성공으로 보고되기 전에는 로컬 시크릿을 지우지 않습니다.
//!
//! 모든 공개 연산은 실패를 raise하지 않고 결과 객체의 `errors`로 돌려줍니다.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cloud::CloudSecretStore;
use crate::error::{MigrationIssue, StoreError};
use crate::models::{
    BackupResult, ClearResult, FullMigrationResult, MigrationResult, MigrationStatus, Provider,
    RestoreResult, SecretKey, UserSecrets, ValidationResult,
};
use crate::secrets::LocalSecretStore;

/// 마이그레이션 코디네이터
///
/// 한 세션에 호출자 하나를 가정하며, 동시 호출에 대한 잠금은 두지 않습니다.
pub struct MigrationCoordinator {
    local: Arc<dyn LocalSecretStore>,
    cloud: Arc<dyn CloudSecretStore>,
}

impl MigrationCoordinator {
    pub fn new(local: Arc<dyn LocalSecretStore>, cloud: Arc<dyn CloudSecretStore>) -> Self {
        Self { local, cloud }
    }

    /// 현재 상태 스냅샷
    ///
    /// 클라우드 조회 실패는 "클라우드 시크릿 없음"으로 취급합니다.
    /// 상태 표시 전용이며 쓰기 판단에 재사용하지 않습니다.
    pub async fn get_migration_status(&self) -> MigrationStatus {
        let has_local_secrets = self.has_any_local_secret().await;
        let is_authenticated = self.cloud.is_authenticated().await;

        let has_cloud_secrets = if is_authenticated {
            match self.cloud.get_secrets().await {
                Ok(secrets) => !secrets.is_empty(),
                Err(e) => {
                    warn!(error = %e, "Cloud secrets check failed, assuming none");
                    false
                }
            }
        } else {
            false
        };

        MigrationStatus {
            has_local_secrets,
            has_cloud_secrets,
            is_authenticated,
        }
    }

    async fn has_any_local_secret(&self) -> bool {
        for key in SecretKey::all() {
            let name = key.to_string();
            match self.local.has(&name).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => warn!(key = %name, error = %e, "Local secret check failed"),
            }
        }
        false
    }

    /// 로컬 시크릿 추출 (실패 시 빈 묶음)
    pub async fn extract_local_secrets(&self) -> UserSecrets {
        match self.try_extract_local_secrets().await {
            Ok(secrets) => secrets,
            Err(e) => {
                error!(error = %e, "Failed to extract local secrets");
                UserSecrets::default()
            }
        }
    }

    async fn try_extract_local_secrets(&self) -> Result<UserSecrets, StoreError> {
        let mut api_keys = BTreeMap::new();
        for provider in Provider::ALL {
            if let Some(value) = self.retrieve_non_empty(&provider.api_key_name()).await? {
                api_keys.insert(provider.as_str().to_string(), value.trim().to_string());
            }
        }

        let system_instructions = self
            .retrieve_non_empty(&SecretKey::SystemInstructions.to_string())
            .await?;

        Ok(UserSecrets {
            api_keys: (!api_keys.is_empty()).then_some(api_keys),
            system_instructions,
        })
    }

    /// 공백만 있는 값은 없는 것으로 취급 (값 자체는 그대로 반환)
    async fn retrieve_non_empty(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .local
            .retrieve(key)
            .await?
            .filter(|value| !value.trim().is_empty()))
    }

    /// 로컬 시크릿을 클라우드로 일괄 import
    ///
    /// `migrated_keys`는 클라우드 응답이 아니라 보낸 데이터 기준입니다.
    pub async fn migrate_to_cloud(&self) -> MigrationResult {
        let status = self.get_migration_status().await;
        if !status.can_migrate() {
            info!(
                has_local_secrets = status.has_local_secrets,
                is_authenticated = status.is_authenticated,
                "Migration blocked"
            );
            return MigrationResult::failed(MigrationIssue::MigrationBlocked);
        }

        let secrets = self.extract_local_secrets().await;
        if secrets.is_empty() {
            return MigrationResult::failed(MigrationIssue::NothingToMigrate);
        }

        match self.cloud.migrate_from_local(&secrets).await {
            Ok(()) => {
                let migrated_keys = secrets.key_names();
                info!(count = migrated_keys.len(), "Secrets migrated to cloud");
                MigrationResult::migrated(migrated_keys)
            }
            Err(e) => {
                error!(error = %e, "Cloud import failed");
                MigrationResult::failed(MigrationIssue::CloudWriteFailed(e.to_string()))
            }
        }
    }

    /// 인식하는 모든 로컬 키 삭제
    ///
    /// 방금 옮긴 키뿐 아니라 고정 키 전부가 대상이며, 한 키가 실패해도 나머지를 계속 시도합니다.
    pub async fn clear_local_secrets_after_migration(&self) -> ClearResult {
        let mut cleared_keys = Vec::new();
        let mut errors = Vec::new();

        for key in SecretKey::all() {
            let name = key.to_string();
            match self.clear_key(&name).await {
                Ok(true) => cleared_keys.push(name),
                Ok(false) => {}
                Err(e) => {
                    warn!(key = %name, error = %e, "Failed to clear local secret");
                    errors.push(MigrationIssue::ClearFailed {
                        key: name,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            cleared = cleared_keys.len(),
            failed = errors.len(),
            "Local secrets cleared"
        );
        ClearResult::new(cleared_keys, errors)
    }

    /// 값이 있으면 삭제하고 `true`
    async fn clear_key(&self, key: &str) -> Result<bool, StoreError> {
        if self.retrieve_non_empty(key).await?.is_none() {
            return Ok(false);
        }
        self.local.remove(key).await?;
        Ok(true)
    }

    /// 마이그레이션 후 성공 시에만 로컬 삭제
    pub async fn perform_full_migration(&self) -> FullMigrationResult {
        let migration = self.migrate_to_cloud().await;
        if !migration.success() {
            return FullMigrationResult::migration_failed(migration);
        }

        let clear = self.clear_local_secrets_after_migration().await;
        FullMigrationResult::completed(migration, clear)
    }

    /// 로컬 시크릿 백업 (메모리 반환만, 저장하지 않음)
    ///
    /// 추출은 실패하지 않으므로 읽기 오류가 있어도 빈 백업으로 성공합니다.
    pub async fn create_local_backup(&self) -> BackupResult {
        let timestamp = chrono::Utc::now().to_rfc3339();
        let backup = self.extract_local_secrets().await;
        info!(keys = backup.key_names().len(), "Local backup created");

        BackupResult {
            success: true,
            backup,
            timestamp,
        }
    }

    /// 클라우드 내용이 기대값과 일치하는지 확인
    pub async fn validate_cloud_migration(&self, expected: &UserSecrets) -> ValidationResult {
        let cloud = match self.cloud.get_secrets().await {
            Ok(secrets) => secrets,
            Err(e) => {
                warn!(error = %e, "Validation fetch failed");
                return ValidationResult::fetch_failed(MigrationIssue::ValidationFetchFailed(
                    e.to_string(),
                ));
            }
        };

        let mut missing_keys = Vec::new();

        if let Some(expected_keys) = &expected.api_keys {
            for (provider, value) in expected_keys {
                let actual = cloud.api_keys.as_ref().and_then(|keys| keys.get(provider));
                if actual != Some(value) {
                    missing_keys.push(format!("{}_api_key", provider));
                }
            }
        }

        if let Some(expected_instructions) = &expected.system_instructions {
            if cloud.system_instructions.as_ref() != Some(expected_instructions) {
                missing_keys.push(SecretKey::SystemInstructions.to_string());
            }
        }

        ValidationResult::compared(missing_keys)
    }

    /// 백업 내용을 로컬 저장소에 되돌려 쓰기
    pub async fn restore_local_backup(&self, backup: &UserSecrets) -> RestoreResult {
        let mut restored_keys = Vec::new();
        let mut errors = Vec::new();

        let mut entries: Vec<(String, &str)> = Vec::new();
        if let Some(api_keys) = &backup.api_keys {
            for (name, value) in api_keys {
                match Provider::from_name(name) {
                    Some(provider) => entries.push((provider.api_key_name(), value.as_str())),
                    None => errors.push(MigrationIssue::RestoreFailed {
                        key: format!("{}_api_key", name),
                        message: "unknown provider".to_string(),
                    }),
                }
            }
        }
        if let Some(instructions) = &backup.system_instructions {
            entries.push((SecretKey::SystemInstructions.to_string(), instructions.as_str()));
        }

        for (key, value) in entries {
            match self.local.store(&key, value).await {
                Ok(()) => restored_keys.push(key),
                Err(e) => {
                    warn!(key = %key, error = %e, "Failed to restore local secret");
                    errors.push(MigrationIssue::RestoreFailed {
                        key,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            restored = restored_keys.len(),
            failed = errors.len(),
            "Local backup restored"
        );
        RestoreResult::new(restored_keys, errors)
    }
}
