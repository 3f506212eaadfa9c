// src/config.rs

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use crate::{
    common::i18n::I18nStore,
    db::{
        AccountRepository, ClientRepository, MemoryStore, OrderRepository, PgStore,
        PreRegistrationRepository, SharedStore, UserRepository,
    },
    models::print::StudioInfo,
    services::{
        audit::SecurityAudit,
        auth::{IdentityProvider, LocalIdentityProvider},
        cache::Cache,
        client_directory::ClientDirectory,
        dashboard_service::DashboardService,
        document_service::DocumentService,
        order_workflow::OrderWorkflow,
        pre_registration::PreRegistrationGate,
        session::{SessionController, DEFAULT_IDLE_MINUTES},
        session_cell::SessionCell,
        user_admin::UserAdminService,
        view_store::ViewStore,
    },
};

/// Domínios de hospedagem conhecidos; outro domínio só gera um aviso no log.
pub const ALLOWED_DOMAINS: [&str; 4] = [
    "localhost",
    "127.0.0.1",
    "studio-osmanager.firebaseapp.com",
    "ilmoretto.github.io",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub bootstrap_admin_email: String,
    pub idle_timeout: Duration,
    pub hosting_domain: String,
    pub project_id: String,
    pub bind_addr: String,
    pub studio: StudioInfo,
    pub technical_responsible: String,
    pub fonts_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            database_url: None,
            jwt_secret: "dev-secret".into(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            bootstrap_admin_email: "admin@osmanager.local".into(),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_MINUTES * 60),
            hosting_domain: "localhost".into(),
            project_id: "osmanager-dev".into(),
            bind_addr: "0.0.0.0:3000".into(),
            studio: StudioInfo {
                name: "Studio".into(),
                cnpj: None,
                phone: None,
                email: None,
                site: None,
                address: None,
                pix_key: None,
            },
            technical_responsible: String::new(),
            fonts_dir: PathBuf::from("./fonts"),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let store_backend = match var_or("STORE_BACKEND", "postgres").to_lowercase().as_str() {
            "postgres" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("STORE_BACKEND inválido: '{}' (use postgres ou memory)", other),
        };

        let database_url = env::var("DATABASE_URL").ok();
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            anyhow::bail!("DATABASE_URL deve ser definida quando STORE_BACKEND=postgres");
        }

        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let bootstrap_admin_email = env::var("BOOTSTRAP_ADMIN_EMAIL")
            .context("BOOTSTRAP_ADMIN_EMAIL deve ser definido")?
            .trim()
            .to_lowercase();

        let idle_minutes: u64 = var_or("IDLE_TIMEOUT_MINUTES", &DEFAULT_IDLE_MINUTES.to_string())
            .parse()
            .context("IDLE_TIMEOUT_MINUTES deve ser um número inteiro")?;
        if idle_minutes == 0 {
            anyhow::bail!("IDLE_TIMEOUT_MINUTES deve ser maior que zero");
        }

        let bcrypt_cost: u32 = var_or("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())
            .parse()
            .context("BCRYPT_COST deve ser um número inteiro")?;

        let studio = StudioInfo {
            name: var_or("STUDIO_NAME", &defaults.studio.name),
            cnpj: optional_var("STUDIO_CNPJ"),
            phone: optional_var("STUDIO_PHONE"),
            email: optional_var("STUDIO_EMAIL"),
            site: optional_var("STUDIO_SITE"),
            address: optional_var("STUDIO_ADDRESS"),
            pix_key: optional_var("STUDIO_PIX_KEY"),
        };

        let config = Self {
            store_backend,
            database_url,
            jwt_secret,
            bcrypt_cost,
            bootstrap_admin_email,
            idle_timeout: Duration::from_secs(idle_minutes * 60),
            hosting_domain: var_or("HOSTING_DOMAIN", &defaults.hosting_domain),
            project_id: var_or("PROJECT_ID", &defaults.project_id),
            bind_addr: var_or("BIND_ADDR", &defaults.bind_addr),
            studio,
            technical_responsible: var_or("TECHNICAL_RESPONSIBLE", ""),
            fonts_dir: PathBuf::from(var_or("FONTS_DIR", "./fonts")),
        };
        config.check_hosting_domain();
        Ok(config)
    }

    /// Domínio fora da lista não impede a execução.
    pub fn check_hosting_domain(&self) -> bool {
        let known = is_allowed_domain(&self.hosting_domain);
        if !known {
            tracing::warn!(
                "⚠️ Domínio '{}' fora da lista de domínios autorizados do projeto {}",
                self.hosting_domain,
                self.project_id
            );
        }
        known
    }
}

pub fn is_allowed_domain(domain: &str) -> bool {
    let host = domain.split(':').next().unwrap_or(domain).trim().to_lowercase();
    ALLOWED_DOMAINS.contains(&host.as_str())
}

// =========================================================================
//  ESTADO DA APLICAÇÃO
// =========================================================================

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: SharedStore,
    pub identity: Arc<dyn IdentityProvider>,
    pub cell: SessionCell,
    pub view: ViewStore,
    pub audit: SecurityAudit,
    pub session: SessionController,
    pub gate: PreRegistrationGate,
    pub directory: ClientDirectory,
    pub workflow: OrderWorkflow,
    pub dashboard: DashboardService,
    pub documents: DocumentService,
    pub admin: UserAdminService,
    pub i18n_store: Arc<I18nStore>,
}

impl AppState {
    /// Monta o grafo de dependências sobre um store já aberto.
    pub fn build(config: AppConfig, store: SharedStore) -> Self {
        let identity: Arc<dyn IdentityProvider> = Arc::new(
            LocalIdentityProvider::new(AccountRepository::new(store.clone()), config.jwt_secret.clone())
                .with_cost(config.bcrypt_cost),
        );

        let users = UserRepository::new(store.clone());
        let pre_registrations = PreRegistrationRepository::new(store.clone());
        let client_repo = ClientRepository::new(store.clone());
        let order_repo = OrderRepository::new(store.clone());

        let cell = SessionCell::new();
        let view = ViewStore::new();
        let audit = SecurityAudit::new();
        let clients = Cache::new();
        let orders = Cache::new();

        let dashboard = DashboardService::new(clients.clone(), orders.clone(), view.clone());
        let documents = DocumentService::new(config.studio.clone(), config.fonts_dir.clone());

        let directory = ClientDirectory::new(
            client_repo.clone(),
            cell.clone(),
            clients,
            orders.clone(),
            dashboard.clone(),
            view.clone(),
            audit.clone(),
        );
        let workflow = OrderWorkflow::new(
            order_repo,
            client_repo,
            cell.clone(),
            orders,
            dashboard.clone(),
            documents.clone(),
            view.clone(),
            audit.clone(),
            config.technical_responsible.clone(),
        );
        let session = SessionController::new(
            identity.clone(),
            users.clone(),
            pre_registrations.clone(),
            cell.clone(),
            directory.clone(),
            workflow.clone(),
            view.clone(),
            audit.clone(),
            &config.bootstrap_admin_email,
            config.idle_timeout,
        );
        let gate = PreRegistrationGate::new(
            pre_registrations,
            identity.clone(),
            cell.clone(),
            audit.clone(),
            &config.bootstrap_admin_email,
        );
        let admin = UserAdminService::new(users, cell.clone(), session.clone(), audit.clone());

        Self {
            config: Arc::new(config),
            store,
            identity,
            cell,
            view,
            audit,
            session,
            gate,
            directory,
            workflow,
            dashboard,
            documents,
            admin,
            i18n_store: Arc::new(I18nStore::new()),
        }
    }

    pub async fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let store: SharedStore = match config.store_backend {
            StoreBackend::Postgres => {
                let database_url = config
                    .database_url
                    .as_deref()
                    .context("DATABASE_URL deve ser definida")?;
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(3))
                    .connect(database_url)
                    .await?;
                tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

                let store = PgStore::new(db_pool);
                store.migrate().await?;
                tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("⚠️ STORE_BACKEND=memory: os dados se perdem ao encerrar o processo");
                Arc::new(MemoryStore::new())
            }
        };

        Ok(Self::build(config, store))
    }
}
