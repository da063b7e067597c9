use serde::Serialize;

/// Body of endpoints that only acknowledge.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// `limit`/`offset` query string shared by the list endpoints.
#[derive(Debug, Clone, Copy, serde::Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub const MAX_PAGE_SIZE: i64 = 500;

impl Pagination {
    /// Effective `(limit, offset)`; limit is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn resolve(self, default_limit: i64) -> (i64, i64) {
        let limit = self.limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
