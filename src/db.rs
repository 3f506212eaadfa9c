// src/db.rs

use std::sync::Arc;

pub mod store;
pub mod memory_store;
pub mod pg_store;

pub mod user_repo;
pub use user_repo::UserRepository;
pub mod account_repo;
pub use account_repo::AccountRepository;
pub mod pre_registration_repo;
pub use pre_registration_repo::PreRegistrationRepository;
pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod order_repo;
pub use order_repo::OrderRepository;

pub use memory_store::MemoryStore;
pub use pg_store::PgStore;

/// Store compartilhado por todos os repositórios.
pub type SharedStore = Arc<dyn store::RemoteStore>;
