//! 클라우드 설정 API 응답 타입 정의

use serde::{Deserialize, Serialize};

/// 세션 조회 응답 (`GET /api/auth/session`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionResponse {
    #[serde(default)]
    pub user: Option<SessionUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// API 에러 응답
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
}
