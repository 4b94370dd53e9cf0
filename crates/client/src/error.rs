use thiserror::Error;

/// 客户端错误
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 刷新令牌失效，需要重新登录
    #[error("Session expired, please log in again")]
    SessionExpired,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// 其它非 2xx 响应
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ClientError {
    /// 对应的 HTTP 状态码 (若有)
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Unauthorized(_) | ClientError::SessionExpired => Some(401),
            ClientError::Forbidden(_) => Some(403),
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Transport(e) => e.status().map(|s| s.as_u16()),
            ClientError::InvalidResponse(_) => None,
        }
    }
}
