//! # IP 白名单拦截
//!
//! 系统设置 `ip_whitelist_enabled` 为真时，后台与订单接口只接受白名单内来源的请求。

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use simtrade_core::system::entity::SETTING_IP_WHITELIST_ENABLED;
use std::net::{IpAddr, SocketAddr};

use crate::error::ApiError;
use crate::server::AppState;

/// 对端地址的初步判定结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeerCheck {
    /// 本机回环地址，直接放行
    Allow,
    /// 需要查询白名单
    Lookup(IpAddr),
    /// 无法获取对端地址
    Deny,
}

fn classify_peer(peer: Option<IpAddr>) -> PeerCheck {
    match peer.map(|ip| ip.to_canonical()) {
        Some(ip) if ip.is_loopback() => PeerCheck::Allow,
        Some(ip) => PeerCheck::Lookup(ip),
        None => PeerCheck::Deny,
    }
}

/// # Summary
/// 按 IP 白名单放行请求。
///
/// # Logic
/// 1. 白名单开关关闭时直接放行。
/// 2. 回环地址始终放行。
/// 3. 对端地址取自 `ConnectInfo<SocketAddr>`，缺失或不在白名单内返回 403。
pub async fn ip_guard(State(state): State<AppState>, req: Request, next: Next) -> Result<Response, ApiError> {
    let enabled = state
        .settings
        .get_setting(SETTING_IP_WHITELIST_ENABLED)
        .await?
        .is_some_and(|s| s.as_bool());
    if !enabled {
        return Ok(next.run(req).await);
    }

    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let allowed = match classify_peer(peer) {
        PeerCheck::Allow => true,
        PeerCheck::Lookup(ip) => state.settings.is_whitelisted(ip).await?,
        PeerCheck::Deny => false,
    };

    if !allowed {
        tracing::warn!(
            "Blocked {} {} from {:?}: not in ip whitelist",
            req.method(),
            req.uri().path(),
            peer
        );
        return Err(ApiError::Forbidden("IP address is not whitelisted".into()));
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_classify_peer() {
        assert_eq!(classify_peer(Some(IpAddr::V4(Ipv4Addr::LOCALHOST))), PeerCheck::Allow);
        assert_eq!(classify_peer(Some(IpAddr::V6(Ipv6Addr::LOCALHOST))), PeerCheck::Allow);
        assert_eq!(classify_peer(None), PeerCheck::Deny);

        let mapped: IpAddr = "::ffff:203.0.113.7".parse().unwrap();
        assert_eq!(
            classify_peer(Some(mapped)),
            PeerCheck::Lookup(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)))
        );
    }
}
