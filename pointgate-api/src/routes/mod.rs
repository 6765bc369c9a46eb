/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Account lifecycle (register, login, password reset, phone login)
/// - `points`: Points balance, consumption, history, recharge
/// - `admin`: Superuser management endpoints

pub mod admin;
pub mod auth;
pub mod health;
pub mod points;

use serde::{Deserialize, Serialize};

/// Plain `{"ok": true}` acknowledgement body
///
/// Used by every mutation endpoint that has nothing else to return.
#[derive(Debug, Serialize, Deserialize)]
pub struct OkResponse {
    /// Always true; errors never reach this type
    pub ok: bool,
}

impl OkResponse {
    /// The canonical acknowledgement
    pub fn new() -> Self {
        Self { ok: true }
    }
}

impl Default for OkResponse {
    fn default() -> Self {
        Self::new()
    }
}
