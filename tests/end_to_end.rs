// tests/end_to_end.rs

use std::{sync::Arc, time::Duration};

use chrono::{Datelike, Local};

use osmanager::{
    config::{AppConfig, AppState},
    db::MemoryStore,
    models::{
        audit::AuditEvent,
        auth::Role,
        client::ClientInput,
        order::{OrderAction, OrderForm, OrderStatus},
        pre_registration::InviteRequest,
        view::Screen,
    },
    services::session::LogoutReason,
};

const ADMIN: &str = "admin@studio.com";
const PASSWORD: &str = "Estudio#2025Forte";

fn app() -> AppState {
    let config = AppConfig {
        jwt_secret: "segredo-de-teste".into(),
        bcrypt_cost: 4,
        bootstrap_admin_email: ADMIN.into(),
        ..AppConfig::default()
    };
    let state = AppState::build(config, Arc::new(MemoryStore::new()));
    state.session.start();
    state
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condição não satisfeita a tempo");
}

#[tokio::test]
async fn invited_user_issues_the_first_order_of_the_year() {
    let app = app();
    assert!(app.gate.seed_default_admin().await.unwrap());

    // Administrador define a senha e pré-cadastra uma colaboradora
    app.gate.complete_first_password(ADMIN, PASSWORD).await.unwrap();
    let admin = app.session.sign_in(ADMIN, PASSWORD).await.unwrap();
    assert_eq!(admin.session.role, Role::Admin);

    app.gate
        .request_invite(InviteRequest {
            name: "Maria Souza".into(),
            email: "maria@studio.com".into(),
            phone: "(11) 99999-0000".into(),
            role: Some(Role::User),
        })
        .await
        .unwrap();
    assert!(app.session.logout(LogoutReason::UserRequested).await);
    assert_eq!(app.view.snapshot().screen, Screen::Login);

    // Primeira senha e login da colaboradora
    app.gate
        .complete_first_password("maria@studio.com", PASSWORD)
        .await
        .unwrap();
    let maria = app.session.sign_in("maria@studio.com", PASSWORD).await.unwrap();
    assert_eq!(maria.session.role, Role::User);
    assert_eq!(maria.session.display_name, "Maria Souza");
    assert_eq!(app.view.snapshot().screen, Screen::App);

    let year = Local::now().year();
    let first = format!("001/{}", year);
    assert_eq!(app.view.snapshot().draft.display_number, first);

    let client_id = app
        .directory
        .create(ClientInput {
            name: "Carlos Lima".into(),
            email: "carlos@email.com".into(),
            phone: "(11) 98888-7777".into(),
            address: String::new(),
            cpf: None,
            rg: None,
            birth_date: None,
        })
        .await
        .unwrap();
    wait_until(|| app.directory.find(&client_id).is_some()).await;
    let client = app.directory.find(&client_id).unwrap();

    let created = app
        .workflow
        .create_order(
            Some(&client),
            OrderForm {
                number: first.clone(),
                services: vec!["Produção: Gravação".into()],
                description: "Ensaio fotográfico".into(),
                ..OrderForm::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(created.order.number, first);
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert_eq!(created.print.title, format!("Ordem de Serviço #{}", first));
    assert_eq!(app.view.snapshot().draft.display_number, format!("002/{}", year));

    let order_id = created.order.id.clone();
    wait_until(|| app.view.row(&order_id).is_some()).await;
    let status = app
        .workflow
        .request_transition(&order_id, OrderAction::Complete)
        .await
        .unwrap();
    assert_eq!(status, OrderStatus::Completed);

    // Convite consumido não volta a aceitar senha
    assert!(
        app.gate
            .complete_first_password("maria@studio.com", PASSWORD)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn admin_sees_security_events_of_the_session() {
    let app = app();
    app.gate.seed_default_admin().await.unwrap();
    app.gate.complete_first_password(ADMIN, PASSWORD).await.unwrap();

    assert!(app.session.sign_in(ADMIN, "senha-errada").await.is_err());
    app.session.sign_in(ADMIN, PASSWORD).await.unwrap();

    let events: Vec<AuditEvent> = app
        .admin
        .audit_trail(50)
        .unwrap()
        .into_iter()
        .map(|entry| entry.event)
        .collect();

    assert!(events.contains(&AuditEvent::LoginFailed));
    assert!(events.contains(&AuditEvent::LoginSuccess));
    assert!(events.contains(&AuditEvent::FirstPasswordSuccess));
}
