// src/common.rs

pub mod error;
pub mod formatting;
pub mod i18n;
