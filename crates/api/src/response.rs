//! Response envelope shared by every endpoint.

use axum::Json;
use axum::http::StatusCode;
use serde::Serialize;
use store::Page;

/// Body shape of every successful response: `{success, message, data}`,
/// plus `meta` pagination on list endpoints.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ListMeta>,
}

/// Pagination block on list responses.
#[derive(Debug, Serialize)]
pub struct ListMeta {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub prev_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl ListMeta {
    pub fn new(page: Page, total: u64) -> Self {
        let prev_page = (page.page() > 1).then(|| page.page() - 1);
        let has_more = u64::from(page.page()) * u64::from(page.limit()) < total;
        let next_page = has_more.then(|| page.page() + 1);
        Self {
            page: page.page(),
            limit: page.limit(),
            total,
            prev_page,
            next_page,
        }
    }
}

/// 200 with data.
pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data: Some(data),
        meta: None,
    })
}

/// 200 with no data payload.
pub fn ok_empty(message: impl Into<String>) -> Json<Envelope<()>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data: None,
        meta: None,
    })
}

/// 201 with data.
pub fn created<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::CREATED,
        Json(Envelope {
            success: true,
            message: message.into(),
            data: Some(data),
            meta: None,
        }),
    )
}

/// 200 with data and pagination meta.
pub fn ok_list<T: Serialize>(
    message: impl Into<String>,
    data: T,
    page: Page,
    total: u64,
) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: message.into(),
        data: Some(data),
        meta: Some(ListMeta::new(page, total)),
    })
}
