// src/test_support.rs

use std::{ops::Deref, sync::Arc};

use chrono::{Datelike, Local};

use crate::{
    config::{AppConfig, AppState},
    db::{MemoryStore, UserRepository},
    models::{client::ClientInput, client::Client},
};

pub const ADMIN_EMAIL: &str = "admin@studio.com";
pub const STRONG_PASSWORD: &str = "Estudio#2025Forte";

/// Aplicação completa sobre o store em memória, com acesso às falhas injetáveis.
pub struct TestApp {
    pub state: AppState,
    pub memory: MemoryStore,
    pub users: UserRepository,
}

impl Deref for TestApp {
    type Target = AppState;

    fn deref(&self) -> &AppState {
        &self.state
    }
}

pub fn config() -> AppConfig {
    AppConfig {
        jwt_secret: "segredo-de-teste".into(),
        bcrypt_cost: 4,
        bootstrap_admin_email: ADMIN_EMAIL.into(),
        technical_responsible: "Responsável Padrão".into(),
        ..AppConfig::default()
    }
}

pub async fn app_without_seed() -> TestApp {
    let memory = MemoryStore::new();
    let store = Arc::new(memory.clone());
    let state = AppState::build(config(), store.clone());
    state.session.start();
    TestApp {
        state,
        memory,
        users: UserRepository::new(store),
    }
}

pub async fn app() -> TestApp {
    let app = app_without_seed().await;
    app.gate.seed_default_admin().await.unwrap();
    app
}

pub fn first_number() -> String {
    format!("001/{}", Local::now().year())
}

/// Conta sem pré-cadastro, autenticada com o papel padrão.
pub async fn sign_in_new_user(app: &TestApp, email: &str) {
    app.identity.create_account(email, STRONG_PASSWORD).await.unwrap();
    app.session.sign_in(email, STRONG_PASSWORD).await.unwrap();
}

/// Administrador inicial: define a primeira senha (uma vez) e entra.
pub async fn sign_in_admin(app: &TestApp) {
    if app.session.current().is_some() {
        app.session
            .logout(crate::services::session::LogoutReason::UserRequested)
            .await;
    }
    let _ = app.gate.complete_first_password(ADMIN_EMAIL, STRONG_PASSWORD).await;
    app.session.sign_in(ADMIN_EMAIL, STRONG_PASSWORD).await.unwrap();
}

pub fn client_input(name: &str, email: &str) -> ClientInput {
    ClientInput {
        name: name.into(),
        phone: "(11) 98888-7777".into(),
        email: email.into(),
        address: "Rua das Flores, 10".into(),
        cpf: Some("123.456.789-00".into()),
        rg: None,
        birth_date: None,
    }
}

/// Cria o cliente e espera o snapshot chegar ao cache.
pub async fn create_client(app: &TestApp, name: &str, email: &str) -> Client {
    let id = app.directory.create(client_input(name, email)).await.unwrap();
    wait_until(|| app.directory.find(&id).is_some()).await;
    app.directory.find(&id).unwrap()
}

/// Espera uma condição que depende de tarefas de sincronização.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condição não satisfeita a tempo");
}
