//! chat-secrets Data Models
//!
//! 프론트엔드 TypeScript 타입과 매핑되는 시크릿/마이그레이션 데이터 모델

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::MigrationIssue;

/// 지원하는 AI 모델 제공자
///
/// 로컬 스캔 키 목록과 추출 대상 목록이 모두 이 enum에서 파생됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
    XAi,
    OpenRouter,
}

impl Provider {
    /// 선언 순서 그대로의 전체 제공자 목록
    pub const ALL: [Provider; 5] = [
        Provider::OpenAi,
        Provider::Anthropic,
        Provider::Google,
        Provider::XAi,
        Provider::OpenRouter,
    ];

    /// `apiKeys` 맵에서 쓰는 제공자 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::XAi => "xai",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }

    /// 로컬 저장소 키 (`<provider>_api_key`)
    pub fn api_key_name(&self) -> String {
        SecretKey::ApiKey(*self).to_string()
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const API_KEY_SUFFIX: &str = "_api_key";
const SYSTEM_INSTRUCTIONS_KEY: &str = "system_instructions";

/// 로컬 저장소에서 인식하는 고정 키
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecretKey {
    ApiKey(Provider),
    SystemInstructions,
}

impl SecretKey {
    /// 제공자 키 5개 + `system_instructions` 순서의 고정 목록
    pub fn all() -> impl Iterator<Item = SecretKey> {
        Provider::ALL
            .into_iter()
            .map(SecretKey::ApiKey)
            .chain(std::iter::once(SecretKey::SystemInstructions))
    }

    /// 키 이름 파싱 (앞뒤 공백만 제거, 빈 문자열은 거부)
    pub fn parse(raw: &str) -> Option<Self> {
        let name = raw.trim();
        if name.is_empty() {
            return None;
        }
        if name == SYSTEM_INSTRUCTIONS_KEY {
            return Some(SecretKey::SystemInstructions);
        }
        name.strip_suffix(API_KEY_SUFFIX)
            .and_then(Provider::from_name)
            .map(SecretKey::ApiKey)
    }
}

impl fmt::Display for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretKey::ApiKey(provider) => write!(f, "{}{}", provider.as_str(), API_KEY_SUFFIX),
            SecretKey::SystemInstructions => f.write_str(SYSTEM_INSTRUCTIONS_KEY),
        }
    }
}

/// 사용자 시크릿 묶음
///
/// 필드가 없으면 "해당 카테고리는 옮길 것이 없음"을 뜻합니다 (빈 문자열과 구분).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSecrets {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_keys: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,
}

impl UserSecrets {
    pub fn is_empty(&self) -> bool {
        self.api_keys.as_ref().map_or(true, |keys| keys.is_empty())
            && self.system_instructions.is_none()
    }

    /// 이 묶음이 담고 있는 로컬 키 이름 (제공자 선언 순서 → system_instructions)
    pub fn key_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(api_keys) = &self.api_keys {
            for provider in Provider::ALL {
                if api_keys.contains_key(provider.as_str()) {
                    names.push(provider.api_key_name());
                }
            }
        }
        if self.system_instructions.is_some() {
            names.push(SecretKey::SystemInstructions.to_string());
        }
        names
    }
}

/// 마이그레이션 상태 스냅샷 (호출 시점 값, 저장되지 않음)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationStatus {
    pub has_local_secrets: bool,
    pub has_cloud_secrets: bool,
    pub is_authenticated: bool,
}

impl MigrationStatus {
    pub fn can_migrate(&self) -> bool {
        self.has_local_secrets && self.is_authenticated
    }
}

impl Serialize for MigrationStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("MigrationStatus", 4)?;
        state.serialize_field("hasLocalSecrets", &self.has_local_secrets)?;
        state.serialize_field("hasCloudSecrets", &self.has_cloud_secrets)?;
        state.serialize_field("canMigrate", &self.can_migrate())?;
        state.serialize_field("isAuthenticated", &self.is_authenticated)?;
        state.end()
    }
}

/// `migrate_to_cloud` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    success: bool,
    migrated_keys: Vec<String>,
    errors: Vec<MigrationIssue>,
}

impl MigrationResult {
    pub(crate) fn migrated(migrated_keys: Vec<String>) -> Self {
        Self {
            success: true,
            migrated_keys,
            errors: Vec::new(),
        }
    }

    pub(crate) fn failed(issue: MigrationIssue) -> Self {
        Self {
            success: false,
            migrated_keys: Vec::new(),
            errors: vec![issue],
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn migrated_keys(&self) -> &[String] {
        &self.migrated_keys
    }

    pub fn errors(&self) -> &[MigrationIssue] {
        &self.errors
    }
}

/// `clear_local_secrets_after_migration` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResult {
    success: bool,
    cleared_keys: Vec<String>,
    errors: Vec<MigrationIssue>,
}

impl ClearResult {
    pub(crate) fn new(cleared_keys: Vec<String>, errors: Vec<MigrationIssue>) -> Self {
        Self {
            success: errors.is_empty(),
            cleared_keys,
            errors,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn cleared_keys(&self) -> &[String] {
        &self.cleared_keys
    }

    pub fn errors(&self) -> &[MigrationIssue] {
        &self.errors
    }
}

/// `perform_full_migration` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FullMigrationResult {
    success: bool,
    migrated_keys: Vec<String>,
    cleared_keys: Vec<String>,
    errors: Vec<MigrationIssue>,
}

impl FullMigrationResult {
    /// 마이그레이션 단계에서 실패한 경우 (clear는 수행되지 않음)
    pub(crate) fn migration_failed(migration: MigrationResult) -> Self {
        Self {
            success: false,
            migrated_keys: migration.migrated_keys,
            cleared_keys: Vec::new(),
            errors: migration.errors,
        }
    }

    pub(crate) fn completed(migration: MigrationResult, clear: ClearResult) -> Self {
        let success = migration.success && clear.success;
        let mut errors = migration.errors;
        errors.extend(clear.errors);
        Self {
            success,
            migrated_keys: migration.migrated_keys,
            cleared_keys: clear.cleared_keys,
            errors,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn migrated_keys(&self) -> &[String] {
        &self.migrated_keys
    }

    pub fn cleared_keys(&self) -> &[String] {
        &self.cleared_keys
    }

    pub fn errors(&self) -> &[MigrationIssue] {
        &self.errors
    }
}

/// 로컬 백업 결과 (호출자 소유, 이 크레이트는 저장하지 않음)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupResult {
    pub success: bool,
    pub backup: UserSecrets,
    /// 호출 시작 시점 (RFC 3339)
    pub timestamp: String,
}

/// `validate_cloud_migration` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    success: bool,
    missing_keys: Vec<String>,
    errors: Vec<MigrationIssue>,
}

impl ValidationResult {
    pub(crate) fn compared(missing_keys: Vec<String>) -> Self {
        Self {
            success: missing_keys.is_empty(),
            missing_keys,
            errors: Vec::new(),
        }
    }

    pub(crate) fn fetch_failed(issue: MigrationIssue) -> Self {
        Self {
            success: false,
            missing_keys: Vec::new(),
            errors: vec![issue],
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn missing_keys(&self) -> &[String] {
        &self.missing_keys
    }

    pub fn errors(&self) -> &[MigrationIssue] {
        &self.errors
    }
}

/// `restore_local_backup` 결과
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    success: bool,
    restored_keys: Vec<String>,
    errors: Vec<MigrationIssue>,
}

impl RestoreResult {
    pub(crate) fn new(restored_keys: Vec<String>, errors: Vec<MigrationIssue>) -> Self {
        Self {
            success: errors.is_empty(),
            restored_keys,
            errors,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn restored_keys(&self) -> &[String] {
        &self.restored_keys
    }

    pub fn errors(&self) -> &[MigrationIssue] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_list_follows_providers() {
        let keys: Vec<String> = SecretKey::all().map(|k| k.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "openai_api_key",
                "anthropic_api_key",
                "google_api_key",
                "xai_api_key",
                "openrouter_api_key",
                "system_instructions",
            ]
        );
        for provider in Provider::ALL {
            assert!(keys.contains(&provider.api_key_name()));
        }
    }

    #[test]
    fn test_parse_secret_key() {
        assert_eq!(
            SecretKey::parse("  anthropic_api_key "),
            Some(SecretKey::ApiKey(Provider::Anthropic))
        );
        assert_eq!(
            SecretKey::parse("system_instructions"),
            Some(SecretKey::SystemInstructions)
        );
        assert_eq!(SecretKey::parse("   "), None);
        assert_eq!(SecretKey::parse("OPENAI_API_KEY"), None);
        assert_eq!(SecretKey::parse("mistral_api_key"), None);
    }

    #[test]
    fn test_user_secrets_wire_shape() {
        let mut api_keys = BTreeMap::new();
        api_keys.insert("openai".to_string(), "sk-1".to_string());
        let secrets = UserSecrets {
            api_keys: Some(api_keys),
            system_instructions: None,
        };
        let json = serde_json::to_value(&secrets).unwrap();
        assert_eq!(json, serde_json::json!({ "apiKeys": { "openai": "sk-1" } }));

        let parsed: UserSecrets = serde_json::from_str("{}").unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_empty_api_key_map_is_empty() {
        let secrets = UserSecrets {
            api_keys: Some(BTreeMap::new()),
            system_instructions: None,
        };
        assert!(secrets.is_empty());
        assert!(secrets.key_names().is_empty());
    }

    #[test]
    fn test_can_migrate_truth_table() {
        for (local, auth) in [(false, false), (false, true), (true, false), (true, true)] {
            let status = MigrationStatus {
                has_local_secrets: local,
                has_cloud_secrets: false,
                is_authenticated: auth,
            };
            assert_eq!(status.can_migrate(), local && auth);
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json["canMigrate"], local && auth);
        }
    }

    #[test]
    fn test_full_result_concatenates_errors_in_order() {
        let migration = MigrationResult::migrated(vec!["openai_api_key".to_string()]);
        let clear = ClearResult::new(
            Vec::new(),
            vec![MigrationIssue::ClearFailed {
                key: "openai_api_key".to_string(),
                message: "boom".to_string(),
            }],
        );
        let full = FullMigrationResult::completed(migration, clear);
        assert!(!full.success());
        assert_eq!(full.migrated_keys(), ["openai_api_key".to_string()]);
        assert_eq!(full.errors().len(), 1);
    }
}
