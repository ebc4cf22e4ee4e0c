//! Stock Service - product catalog and atomic stock balance updates.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
