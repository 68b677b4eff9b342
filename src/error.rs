//! chat-secrets Error Types
//!
//! 저장소 계층 에러(`StoreError`)와 마이그레이션 결과에 기록되는 이슈(`MigrationIssue`) 정의

use serde::ser::SerializeStruct;
use serde::Serialize;
use thiserror::Error;

use crate::secrets::vault::VaultError;

/// 로컬/클라우드 저장소 capability 에러
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Invalid master key format")]
    InvalidMasterKey,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cloud API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Vault(VaultError::Io(err))
    }
}

/// 마이그레이션 결과의 `errors`에 쌓이는 항목
///
/// 호출자에게 raise되지 않고 항상 결과 객체 안에 담겨 전달됩니다.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MigrationIssue {
    #[error("Cannot migrate: user is not authenticated or no local secrets found")]
    MigrationBlocked,

    #[error("No local secrets found to migrate")]
    NothingToMigrate,

    #[error("Failed to migrate secrets to cloud: {0}")]
    CloudWriteFailed(String),

    #[error("Failed to clear {key}: {message}")]
    ClearFailed { key: String, message: String },

    #[error("Failed to fetch cloud secrets for validation: {0}")]
    ValidationFetchFailed(String),

    #[error("Failed to restore {key}: {message}")]
    RestoreFailed { key: String, message: String },
}

impl MigrationIssue {
    /// 프론트엔드에서 분기 처리용으로 쓰는 에러 코드
    pub fn code(&self) -> &'static str {
        match self {
            MigrationIssue::MigrationBlocked => "MIGRATION_BLOCKED",
            MigrationIssue::NothingToMigrate => "NOTHING_TO_MIGRATE",
            MigrationIssue::CloudWriteFailed(_) => "CLOUD_WRITE_FAILED",
            MigrationIssue::ClearFailed { .. } => "CLEAR_FAILED",
            MigrationIssue::ValidationFetchFailed(_) => "VALIDATION_FETCH_FAILED",
            MigrationIssue::RestoreFailed { .. } => "RESTORE_FAILED",
        }
    }
}

// UI 레이어가 바로 렌더링할 수 있도록 {code, message} 구조로 직렬화
impl Serialize for MigrationIssue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("MigrationIssue", 2)?;
        state.serialize_field("code", self.code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_serialization() {
        let issue = MigrationIssue::ClearFailed {
            key: "openai_api_key".to_string(),
            message: "locked".to_string(),
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["code"], "CLEAR_FAILED");
        assert_eq!(json["message"], "Failed to clear openai_api_key: locked");
    }

    #[test]
    fn test_io_error_wraps_into_vault() {
        let err: StoreError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert!(matches!(err, StoreError::Vault(VaultError::Io(_))));
    }
}
