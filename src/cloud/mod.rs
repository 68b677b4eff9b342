//! 클라우드 설정 저장소 연동 모듈
//!
//! 사용자 계정에 묶인 설정/시크릿 API를 인증된 HTTP 호출로 다룹니다.

pub mod client;
pub mod types;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::UserSecrets;

pub use client::CloudSettingsClient;

/// 인증된 클라우드 시크릿 저장소
#[async_trait]
pub trait CloudSecretStore: Send + Sync {
    /// 현재 세션이 유효한지 확인 (실패는 `false`로 취급)
    async fn is_authenticated(&self) -> bool;

    async fn get_secrets(&self) -> Result<UserSecrets, StoreError>;

    async fn set_secrets(&self, secrets: &UserSecrets) -> Result<(), StoreError>;

    /// 로컬 시크릿 일괄 import (기록된 키 목록은 돌려주지 않음)
    async fn migrate_from_local(&self, secrets: &UserSecrets) -> Result<(), StoreError>;
}
