//! Core library for the slank diet tracker: sheet-backed storage with a
//! local CSV cache, derived energy metrics, and the service layer.

pub mod cache;
pub mod metrics;
pub mod models;
pub mod service;
pub mod sheets;
pub mod table;
