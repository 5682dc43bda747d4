//! HTTP handlers for the AI service.

pub mod ai;
pub mod health;
pub mod metrics;
pub mod pages;
