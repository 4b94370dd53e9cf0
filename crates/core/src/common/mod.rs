pub mod time;

use serde::{Deserialize, Serialize};

/// 单页最大条数
pub const MAX_PAGE_SIZE: u32 = 100;
/// 默认每页条数
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// 生成新的全局唯一实体 ID (UUID v4)。
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// # Summary
/// 分页请求参数。
///
/// # Invariants
/// - `page` 从 1 开始计数。
/// - `page_size` 经过 `normalized` 后落在 `1..=MAX_PAGE_SIZE` 区间。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }.normalized()
    }

    /// 将越界的页码和页大小修正到合法范围内
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// SQL `OFFSET`
    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    /// SQL `LIMIT`
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// # Summary
/// 分页查询结果。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 满足过滤条件的记录总数
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, req: PageRequest) -> Self {
        Self {
            items,
            total,
            page: req.page,
            page_size: req.page_size,
        }
    }

    /// 对每个元素做类型转换，保留分页信息
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_normalization() {
        let req = PageRequest::new(0, 1000);
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 0);

        let req = PageRequest::new(3, 25);
        assert_eq!(req.offset(), 50);
        assert_eq!(req.limit(), 25);
    }

    #[test]
    fn test_page_map_keeps_meta() {
        let page = Page::new(vec![1, 2, 3], 42, PageRequest::new(2, 3));
        let mapped = page.map(|v| v * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.total, 42);
        assert_eq!(mapped.page, 2);
    }
}
