//! Data-sync and filter layer for a personal-finance dashboard.

pub mod backend;
pub mod cache;
pub mod config;
pub mod dashboard;
pub mod entities;
pub mod filter;
pub mod logging;
pub mod pagination;
pub mod sync;
