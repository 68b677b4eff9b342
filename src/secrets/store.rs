//! 로컬 시크릿 저장소 capability

use async_trait::async_trait;

use crate::error::StoreError;

/// 로컬 암호화 key-value 저장소
///
/// `retrieve`는 복호화 후 값을 돌려주며, 실패는 `Err`로 잡을 수 있어야 합니다.
/// 값이 없으면 `Ok(None)`.
#[async_trait]
pub trait LocalSecretStore: Send + Sync {
    async fn retrieve(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn store(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// 없는 키 삭제는 성공으로 취급
    async fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// 비어있지 않은 값이 존재하는지 확인
    async fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self
            .retrieve(key)
            .await?
            .is_some_and(|value| !value.trim().is_empty()))
    }
}
