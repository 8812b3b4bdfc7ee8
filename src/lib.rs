//! Equipment Catalog
//!
//! REST JSON server for a plant equipment inventory: sites and workshops,
//! equipment types with typed characteristics, and equipment instances
//! carrying characteristic values, parent links and passport scans.

use std::sync::Arc;

pub mod access;
pub mod api;
pub mod blobs;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
