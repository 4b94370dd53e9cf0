//! # 后台业务接口的类型化封装
//!
//! 请求与响应结构直接复用 `simtrade-api` 的 DTO。

use rust_decimal::Decimal;

use simtrade_api::types::{
    AdminResponse, BalanceAdjustRequest, BalanceEntryResponse, CreateUserRequest, IpWhitelistRequest,
    IpWhitelistResponse, PageResponse, PlaceTransactionRequest, PublishTickerRequest, PutSettingRequest,
    SettingResponse, SettleTransactionRequest, TickerResponse, TransactionListQuery, TransactionResponse,
    UpdateUserRequest, UserListQuery, UserResponse,
};

use crate::client::ApiClient;
use crate::error::ClientError;

impl ApiClient {
    /// 当前登录的管理员
    pub async fn me(&self) -> Result<AdminResponse, ClientError> {
        self.get("/auth/me").await
    }

    // --- 用户 ---

    pub async fn list_users(&self, query: &UserListQuery) -> Result<PageResponse<UserResponse>, ClientError> {
        self.get_with_query("/admin/users", query).await
    }

    pub async fn create_user(&self, req: &CreateUserRequest) -> Result<UserResponse, ClientError> {
        self.post("/admin/users", req).await
    }

    pub async fn get_user(&self, id: &str) -> Result<UserResponse, ClientError> {
        self.get(&format!("/admin/users/{}", id)).await
    }

    pub async fn update_user(&self, id: &str, req: &UpdateUserRequest) -> Result<UserResponse, ClientError> {
        self.put(&format!("/admin/users/{}", id), req).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<(), ClientError> {
        self.delete::<String>(&format!("/admin/users/{}", id)).await.map(|_| ())
    }

    pub async fn adjust_balance(&self, id: &str, delta: Decimal, reason: &str) -> Result<BalanceEntryResponse, ClientError> {
        let req = BalanceAdjustRequest {
            delta,
            reason: reason.to_string(),
        };
        self.post(&format!("/admin/users/{}/balance", id), &req).await
    }

    // --- 订单 ---

    pub async fn list_transactions(
        &self,
        query: &TransactionListQuery,
    ) -> Result<PageResponse<TransactionResponse>, ClientError> {
        self.get_with_query("/transactions", query).await
    }

    pub async fn place_transaction(&self, req: &PlaceTransactionRequest) -> Result<TransactionResponse, ClientError> {
        self.post("/transactions", req).await
    }

    pub async fn settle_transaction(&self, id: &str, exit_price: Decimal) -> Result<TransactionResponse, ClientError> {
        self.post(&format!("/transactions/{}/settle", id), &SettleTransactionRequest { exit_price })
            .await
    }

    pub async fn cancel_transaction(&self, id: &str) -> Result<TransactionResponse, ClientError> {
        self.post(&format!("/transactions/{}/cancel", id), &serde_json::json!({})).await
    }

    // --- 设置 ---

    pub async fn list_settings(&self) -> Result<Vec<SettingResponse>, ClientError> {
        self.get("/admin/settings").await
    }

    pub async fn put_setting(&self, key: &str, value: &str) -> Result<SettingResponse, ClientError> {
        let req = PutSettingRequest {
            value: value.to_string(),
            description: None,
        };
        self.put(&format!("/admin/settings/{}", key), &req).await
    }

    pub async fn list_whitelist(&self) -> Result<Vec<IpWhitelistResponse>, ClientError> {
        self.get("/admin/ip-whitelist").await
    }

    pub async fn add_whitelist(&self, ip_address: &str, description: Option<&str>) -> Result<IpWhitelistResponse, ClientError> {
        let req = IpWhitelistRequest {
            ip_address: ip_address.to_string(),
            description: description.map(str::to_string),
        };
        self.post("/admin/ip-whitelist", &req).await
    }

    // --- 行情 ---

    pub async fn list_tickers(&self) -> Result<Vec<TickerResponse>, ClientError> {
        self.get("/market/tickers").await
    }

    pub async fn publish_ticker(&self, symbol: &str, price: Decimal) -> Result<TickerResponse, ClientError> {
        let req = PublishTickerRequest {
            price,
            change_24h: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
        };
        self.put(&format!("/admin/market/tickers/{}", symbol), &req).await
    }
}
