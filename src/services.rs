// src/services.rs

pub mod audit;
pub mod auth;
pub mod cache;
pub mod client_directory;
pub mod dashboard_service;
pub mod document_service;
pub mod idle;
pub mod order_workflow;
pub mod pre_registration;
pub mod session;
pub mod session_cell;
pub mod user_admin;
pub mod view_store;
