// src/models.rs

pub mod audit;
pub mod auth;
pub mod client;
pub mod dashboard;
pub mod order;
pub mod pre_registration;
pub mod print;
pub mod view;
