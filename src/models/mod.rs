//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the resource definitions and the response envelopes used by the API.

pub mod records;

pub use records::*;

use crate::auth::Role;
use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

/// Collection listing with the caller's role attached
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T: Serialize> {
    pub success: bool,
    pub count: usize,
    pub data: Vec<T>,
    pub user_role: Role,
}

impl<T: Serialize> ListResponse<T> {
    pub fn new(data: Vec<T>, user_role: Role) -> Self {
        Self {
            success: true,
            count: data.len(),
            data,
            user_role,
        }
    }
}
