// src/handlers.rs

pub mod admin;
pub mod auth;
pub mod clients;
pub mod dashboard;
pub mod orders;
pub mod session;
