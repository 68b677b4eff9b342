//! 클라우드 설정 REST API 클라이언트
//!
//! 세션 토큰(Bearer)으로 사용자 시크릿을 조회/저장/일괄 import 합니다.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use crate::cloud::types::{ApiErrorBody, SessionResponse};
use crate::cloud::CloudSecretStore;
use crate::config::CloudConfig;
use crate::error::StoreError;
use crate::models::UserSecrets;

const SESSION_PATH: &str = "api/auth/session";
const SECRETS_PATH: &str = "api/user/secrets";
const MIGRATE_PATH: &str = "api/user/secrets/migrate";

/// 클라우드 설정 API 클라이언트
pub struct CloudSettingsClient {
    base_url: Url,
    /// 세션 토큰 (메모리에만 보관)
    token: RwLock<Option<String>>,
    http: reqwest::Client,
}

impl CloudSettingsClient {
    pub fn new(base_url: Url) -> Self {
        Self::with_http(base_url, None, reqwest::Client::new())
    }

    /// 설정값으로 생성 (timeout이 없으면 요청 시간 제한 없음)
    pub fn from_config(config: &CloudConfig) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self::with_http(
            config.base_url.clone(),
            config.session_token.clone(),
            http,
        ))
    }

    fn with_http(mut base_url: Url, token: Option<String>, http: reqwest::Client) -> Self {
        // 상대 경로 join 시 base path가 유지되도록 끝에 '/'를 붙임
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            base_url,
            token: RwLock::new(token.filter(|t| !t.trim().is_empty())),
            http,
        }
    }

    /// 세션 토큰 설정 (빈 문자열이면 로그아웃과 동일)
    pub async fn set_session_token(&self, token: impl Into<String>) {
        let token = token.into();
        if token.trim().is_empty() {
            self.clear_session_token().await;
            return;
        }
        *self.token.write().await = Some(token);
        info!("Cloud session token set");
    }

    pub async fn clear_session_token(&self) {
        *self.token.write().await = None;
        info!("Cloud session token cleared");
    }

    pub async fn has_session_token(&self) -> bool {
        self.token.read().await.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::InvalidResponse(format!("Invalid endpoint {}: {}", path, e)))
    }

    async fn require_token(&self) -> Result<String, StoreError> {
        self.token
            .read()
            .await
            .clone()
            .ok_or(StoreError::Unauthenticated)
    }

    /// 응답 상태 확인 후 본문 반환
    async fn read_body(response: reqwest::Response) -> Result<String, StoreError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn get_json<T>(&self, path: &str, token: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
    {
        let response = self
            .http
            .get(self.endpoint(path)?)
            .bearer_auth(token)
            .send()
            .await?;

        let body = Self::read_body(response).await?;
        // 본문에 시크릿이 있을 수 있으므로 에러 메시지에 포함하지 않음
        serde_json::from_str(&body).map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }

    async fn fetch_session(&self, token: &str) -> Result<SessionResponse, StoreError> {
        self.get_json(SESSION_PATH, token).await
    }
}

#[async_trait]
impl CloudSecretStore for CloudSettingsClient {
    async fn is_authenticated(&self) -> bool {
        let Some(token) = self.token.read().await.clone() else {
            return false;
        };

        match self.fetch_session(&token).await {
            Ok(session) => session.user.is_some(),
            Err(e) => {
                warn!(error = %e, "Session check failed");
                false
            }
        }
    }

    async fn get_secrets(&self) -> Result<UserSecrets, StoreError> {
        let token = self.require_token().await?;
        let secrets: UserSecrets = self.get_json(SECRETS_PATH, &token).await?;
        debug!(keys = secrets.key_names().len(), "Fetched cloud secrets");
        Ok(secrets)
    }

    async fn set_secrets(&self, secrets: &UserSecrets) -> Result<(), StoreError> {
        let token = self.require_token().await?;
        let response = self
            .http
            .put(self.endpoint(SECRETS_PATH)?)
            .bearer_auth(&token)
            .json(secrets)
            .send()
            .await?;

        Self::read_body(response).await?;
        info!(keys = secrets.key_names().len(), "Cloud secrets updated");
        Ok(())
    }

    async fn migrate_from_local(&self, secrets: &UserSecrets) -> Result<(), StoreError> {
        let token = self.require_token().await?;
        let response = self
            .http
            .post(self.endpoint(MIGRATE_PATH)?)
            .bearer_auth(&token)
            .json(secrets)
            .send()
            .await?;

        Self::read_body(response).await?;
        info!(keys = secrets.key_names().len(), "Local secrets imported to cloud");
        Ok(())
    }
}
