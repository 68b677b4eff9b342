//! 환경 설정
//!
//! `.env` / `.env.local` 파일과 환경변수에서 클라우드 API와 vault 위치를 읽습니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

pub const CLOUD_URL_ENV: &str = "CHAT_SECRETS_CLOUD_URL";
pub const SESSION_TOKEN_ENV: &str = "CHAT_SECRETS_SESSION_TOKEN";
pub const HTTP_TIMEOUT_ENV: &str = "CHAT_SECRETS_HTTP_TIMEOUT_SECS";
pub const VAULT_DIR_ENV: &str = "CHAT_SECRETS_VAULT_DIR";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// 클라우드 설정 API 접속 정보
#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub base_url: Url,
    pub session_token: Option<String>,
    /// 없으면 요청 시간 제한을 두지 않음
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub cloud: CloudConfig,
    pub vault_dir: PathBuf,
}

/// `.env` 파일을 찾을 때 상위로 올라가는 최대 단계
const MAX_ENV_HOPS: usize = 6;

impl AppConfig {
    /// 현재 디렉터리 기준 `.env` / `.env.local`과 프로세스 환경변수에서 설정 읽기
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |name: &str| std::env::var(name).ok();
        match std::env::current_dir() {
            Ok(cwd) => Self::from_env_files(&cwd, lookup),
            Err(_) => Self::from_lookup(lookup),
        }
    }

    /// `start`부터 상위로 `.env`, `.env.local`을 찾아 합친 뒤 설정 읽기
    ///
    /// 우선순위: 비어있지 않은 `lookup` 값 > `.env.local` > `.env`.
    /// 프로세스 환경변수는 변경하지 않습니다.
    pub fn from_env_files<F>(start: &Path, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file_vars: HashMap<String, String> = HashMap::new();
        for filename in [".env", ".env.local"] {
            let Some(path) = find_upwards(start, filename, MAX_ENV_HOPS) else {
                continue;
            };
            let entries = read_env_file(&path);
            debug!(path = %path.display(), entries = entries.len(), "Loaded env file");
            file_vars.extend(entries);
        }

        Self::from_lookup(|name| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .or_else(|| file_vars.get(name).cloned())
        })
    }

    /// 임의의 조회 함수로 설정 읽기 (빈 값은 미설정으로 취급)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let raw_url = get(CLOUD_URL_ENV).ok_or(ConfigError::Missing(CLOUD_URL_ENV))?;
        let base_url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: CLOUD_URL_ENV,
            reason: e.to_string(),
        })?;

        let timeout = get(HTTP_TIMEOUT_ENV)
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::Invalid {
                        name: HTTP_TIMEOUT_ENV,
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        let vault_dir = get(VAULT_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            cloud: CloudConfig {
                base_url,
                session_token: get(SESSION_TOKEN_ENV),
                timeout,
            },
            vault_dir,
        })
    }
}

fn is_valid_env_key(key: &str) -> bool {
    if key.is_empty() {
        return false;
    }
    key.chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// `KEY=VALUE` 라인만 추려서 파싱
///
/// 주석, 코드펜스, 설명 문장은 건너뜁니다.
fn parse_env_lenient(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("```"))
        .filter_map(|line| {
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if !is_valid_env_key(key) {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// dotenv 형식으로 읽고, 실패하면(예: markdown이 섞인 파일) lenient 파서로 재시도
fn read_env_file(path: &Path) -> Vec<(String, String)> {
    let strict = dotenvy::from_path_iter(path)
        .and_then(|iter| iter.collect::<Result<Vec<_>, _>>());

    match strict {
        Ok(entries) => entries,
        Err(e) => {
            debug!(
                path = %path.display(),
                error = %e,
                "Strict env parse failed, retrying leniently"
            );
            std::fs::read_to_string(path)
                .map(|text| parse_env_lenient(&text))
                .unwrap_or_default()
        }
    }
}

fn find_upwards(start: &Path, filename: &str, max_hops: usize) -> Option<PathBuf> {
    start
        .ancestors()
        .take(max_hops + 1)
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}
