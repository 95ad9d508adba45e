//! Alta Colaboradores - onboarding, offboarding and hiring analytics
//!
//! This library provides the HTTP service and the building blocks shared
//! with the `alta-admin` command line tool.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod views;
