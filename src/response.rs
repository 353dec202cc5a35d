//! Standard response envelope helpers.

use crate::service::Pagination;
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessPage<T> {
    pub data: Vec<T>,
    pub paging: Paging,
}

#[derive(Serialize)]
pub struct Paging {
    /// Matching records across all pages.
    pub records: u64,
    pub offset: u64,
    pub limit: Option<u64>,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data }))
}

pub fn success_page<T: Serialize>(
    data: Vec<T>,
    records: u64,
    pagination: Pagination,
) -> (StatusCode, Json<SuccessPage<T>>) {
    (
        StatusCode::OK,
        Json(SuccessPage {
            data,
            paging: Paging {
                records,
                offset: pagination.offset,
                limit: pagination.limit,
            },
        }),
    )
}
