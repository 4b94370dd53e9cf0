use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex as AsyncMutex, broadcast};

use simtrade_api::types::{LoginRequest, RefreshRequest, TokenResponse};

use crate::error::ClientError;

const LOGIN_PATH: &str = "/auth/login";
const REFRESH_PATH: &str = "/auth/refresh";
const LOGOUT_PATH: &str = "/auth/logout";
const EVENT_CAPACITY: usize = 16;

/// # Summary
/// 会话事件，供界面层订阅 (跳转登录页、提示无权限等)。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// 服务端返回 403
    Forbidden { path: String },
    /// 刷新失败，令牌已清空
    SessionExpired,
}

/// 当前持有的令牌。`generation` 在令牌每次变化时递增。
#[derive(Debug, Default)]
struct Session {
    access_token: Option<String>,
    refresh_token: Option<String>,
    generation: u64,
}

/// 服务端统一响应包装
#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    error: Option<String>,
}

struct Inner {
    http: Client,
    base_url: String,
    session: Mutex<Session>,
    /// 同一时刻只允许一个刷新请求在途
    refresh_flight: AsyncMutex<()>,
    events: broadcast::Sender<AuthEvent>,
}

/// # Summary
/// 后台 REST 客户端。克隆后共享同一份会话。
///
/// # Invariants
/// - 任意数量的并发 401 只触发一次 `/auth/refresh`，其余请求复用该次结果。
/// - 每个请求最多重试一次。
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

fn refreshable(path: &str) -> bool {
    path != LOGIN_PATH && path != REFRESH_PATH
}

impl ApiClient {
    /// # Summary
    /// 创建客户端。
    ///
    /// # Arguments
    /// * `base_url`: 服务根地址，如 `http://127.0.0.1:8080`。
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        if rustls::crypto::ring::default_provider().install_default().is_err() {
            tracing::debug!("rustls crypto provider already installed");
        }
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                session: Mutex::new(Session::default()),
                refresh_flight: AsyncMutex::new(()),
                events,
            }),
        })
    }

    /// 订阅会话事件
    pub fn events(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    fn emit(&self, event: AuthEvent) {
        if self.inner.events.send(event).is_err() {
            tracing::trace!("No auth event subscribers");
        }
    }

    /// 注入一对令牌 (例如从本地存储恢复会话)
    pub fn set_tokens(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
        let mut session = self.session();
        session.access_token = Some(access_token.into());
        session.refresh_token = Some(refresh_token.into());
        session.generation += 1;
    }

    pub fn clear_tokens(&self) {
        let mut session = self.session();
        session.access_token = None;
        session.refresh_token = None;
        session.generation += 1;
    }

    pub fn is_authenticated(&self) -> bool {
        self.session().access_token.is_some()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.session().refresh_token.clone()
    }

    // ============================================================
    //  会话
    // ============================================================

    /// 登录并保存返回的令牌
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ClientError> {
        let req = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let tokens: TokenResponse = self.request(Method::POST, LOGIN_PATH, None::<&()>, Some(&req)).await?;
        self.set_tokens(tokens.access_token.clone(), tokens.refresh_token.clone());
        tracing::info!("Logged in as {}", username);
        Ok(tokens)
    }

    /// 吊销服务端的刷新令牌。无论请求是否成功，本地令牌都会被清空。
    pub async fn logout(&self) -> Result<(), ClientError> {
        let Some(refresh_token) = self.refresh_token() else {
            return Ok(());
        };
        let result: Result<String, ClientError> = self
            .request(Method::POST, LOGOUT_PATH, None::<&()>, Some(&RefreshRequest { refresh_token }))
            .await;
        self.clear_tokens();
        result.map(|_| ())
    }

    // ============================================================
    //  通用 JSON 请求
    // ============================================================

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::GET, path, None::<&()>, None::<&()>).await
    }

    pub async fn get_with_query<Q, T>(&self, path: &str, query: &Q) -> Result<T, ClientError>
    where
        Q: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, Some(query), None::<&()>).await
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, None::<&()>, Some(body)).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PUT, path, None::<&()>, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.request(Method::DELETE, path, None::<&()>, None::<&()>).await
    }

    /// # Summary
    /// 发送请求并解包 `data`。
    ///
    /// # Logic
    /// 1. 附带当前 Access Token 发送，并记下发送时的令牌代数。
    /// 2. 401 且非登录 / 刷新接口时，等待单飞刷新后重试一次。
    /// 3. 解析响应，403 时广播 `Forbidden` 事件。
    async fn request<Q, B, T>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> Result<T, ClientError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (resp, generation) = self.send(method.clone(), path, query, body).await?;
        let resp = if resp.status() == StatusCode::UNAUTHORIZED && refreshable(path) {
            self.refresh_session(generation).await?;
            self.send(method, path, query, body).await?.0
        } else {
            resp
        };
        self.decode(path, resp).await
    }

    async fn send<Q, B>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Q>,
        body: Option<&B>,
    ) -> Result<(Response, u64), ClientError>
    where
        Q: Serialize + ?Sized,
        B: Serialize + ?Sized,
    {
        let (token, generation) = {
            let session = self.session();
            (session.access_token.clone(), session.generation)
        };

        let mut req = self.inner.http.request(method, self.url(path));
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok((req.send().await?, generation))
    }

    /// # Summary
    /// 单飞刷新。
    ///
    /// # Logic
    /// 1. 取得刷新锁。
    /// 2. 若令牌代数已不同于失败请求发送时的代数，说明其它请求已完成刷新，直接复用结果。
    /// 3. 否则调用 `/auth/refresh`；成功则写入新令牌，失败则清空会话并广播 `SessionExpired`。
    async fn refresh_session(&self, seen_generation: u64) -> Result<(), ClientError> {
        let _flight = self.inner.refresh_flight.lock().await;

        let refresh_token = {
            let session = self.session();
            if session.generation != seen_generation {
                return if session.access_token.is_some() {
                    Ok(())
                } else {
                    Err(ClientError::SessionExpired)
                };
            }
            session.refresh_token.clone()
        };
        let Some(refresh_token) = refresh_token else {
            self.expire_session();
            return Err(ClientError::SessionExpired);
        };

        tracing::debug!("Access token rejected, refreshing session");
        let resp = self
            .inner
            .http
            .post(self.url(REFRESH_PATH))
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let tokens = if resp.status().is_success() {
            resp.json::<Envelope<TokenResponse>>().await.ok().and_then(|e| e.data)
        } else {
            tracing::warn!("Session refresh rejected with {}", resp.status());
            None
        };

        match tokens {
            Some(tokens) => {
                self.set_tokens(tokens.access_token, tokens.refresh_token);
                Ok(())
            }
            None => {
                self.expire_session();
                Err(ClientError::SessionExpired)
            }
        }
    }

    fn expire_session(&self) {
        self.clear_tokens();
        self.emit(AuthEvent::SessionExpired);
    }

    async fn decode<T: DeserializeOwned>(&self, path: &str, resp: Response) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let envelope: Envelope<T> = resp.json().await?;
            return envelope
                .data
                .ok_or_else(|| ClientError::InvalidResponse(format!("{} returned no data", path)));
        }

        let message = resp
            .json::<Envelope<serde_json::Value>>()
            .await
            .ok()
            .and_then(|e| e.error)
            .unwrap_or_else(|| status.to_string());

        match status {
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized(message)),
            StatusCode::FORBIDDEN => {
                self.emit(AuthEvent::Forbidden { path: path.to_string() });
                Err(ClientError::Forbidden(message))
            }
            _ => Err(ClientError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_paths_are_not_refreshed() {
        assert!(!refreshable(LOGIN_PATH));
        assert!(!refreshable(REFRESH_PATH));
        assert!(refreshable(LOGOUT_PATH));
        assert!(refreshable("/admin/users"));
    }

    #[test]
    fn test_token_generation_advances() {
        let client = ApiClient::new("http://127.0.0.1:1/").unwrap();
        assert_eq!(client.inner.base_url, "http://127.0.0.1:1");
        assert!(!client.is_authenticated());

        client.set_tokens("a", "r");
        assert!(client.is_authenticated());
        assert_eq!(client.refresh_token().as_deref(), Some("r"));
        let generation = client.session().generation;

        client.clear_tokens();
        assert!(!client.is_authenticated());
        assert_eq!(client.session().generation, generation + 1);
    }
}
