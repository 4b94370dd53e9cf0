//! # 图片上传路由
//!
//! 接收 multipart 表单中的 `file` 字段，校验 MIME 类型与大小后以 `<uuid>.<ext>` 落盘，
//! 落盘目录通过 `/uploads/{file}` 对外提供静态访问。

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use std::path::Path;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::middleware::auth::CurrentAdmin;
use crate::server::AppState;
use crate::types::{ApiResponse, UploadResponse};

/// 表单字段名
pub const UPLOAD_FIELD: &str = "file";

/// 允许上传的图片类型及其落盘扩展名
const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// 按 MIME 类型取扩展名，不在白名单内返回 `None`
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
}

/// multipart 表单 (仅用于文档)
#[derive(ToSchema)]
pub struct UploadForm {
    /// 图片文件 (jpeg / png / gif / webp)
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

fn multipart_err(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::BadRequest(e.body_text())
    }
}

/// 上传图片
#[utoipa::path(
    post,
    path = "/admin/uploads",
    tag = "内容管理 (Content)",
    security(("bearer_jwt" = [])),
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "上传成功", body = ApiResponse<UploadResponse>),
        (status = 400, description = "缺少 file 字段"),
        (status = 413, description = "文件超过大小限制"),
        (status = 415, description = "不支持的文件类型")
    )
)]
pub async fn upload_image(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let limits = &state.config.upload;

    while let Some(field) = multipart.next_field().await.map_err(multipart_err)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let content_type = field.content_type().unwrap_or_default().to_string();
        let ext = extension_for(&content_type).ok_or_else(|| {
            tracing::warn!("Admin {} tried to upload {:?}", admin.username, content_type);
            ApiError::UnsupportedMediaType(format!("{} is not an allowed image type", content_type))
        })?;

        let data = field.bytes().await.map_err(multipart_err)?;
        if data.len() > limits.max_bytes {
            return Err(ApiError::PayloadTooLarge(format!(
                "file is {} bytes, limit is {}",
                data.len(),
                limits.max_bytes
            )));
        }
        if data.is_empty() {
            return Err(ApiError::BadRequest("file is empty".into()));
        }

        let filename = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        let dir = Path::new(&limits.dir);
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ApiError::Internal(format!("create upload dir {}: {}", dir.display(), e)))?;
        tokio::fs::write(dir.join(&filename), &data)
            .await
            .map_err(|e| ApiError::Internal(format!("write upload {}: {}", filename, e)))?;

        tracing::info!("Admin {} uploaded {} ({} bytes)", admin.username, filename, data.len());
        return Ok(Json(ApiResponse::ok(UploadResponse {
            url: format!("/uploads/{}", filename),
            filename,
            content_type,
            size: u64::try_from(data.len()).unwrap_or(u64::MAX),
        })));
    }

    Err(ApiError::BadRequest(format!("multipart field '{}' is required", UPLOAD_FIELD)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_whitelist() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(extension_for("image/webp; charset=binary"), Some("webp"));
        assert_eq!(extension_for("image/svg+xml"), None);
        assert_eq!(extension_for("application/pdf"), None);
        assert_eq!(extension_for(""), None);
    }
}
