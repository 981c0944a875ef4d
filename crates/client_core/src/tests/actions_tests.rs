use super::*;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode as AxumStatus},
    response::{IntoResponse, Redirect},
    routing::post,
    Form, Router,
};
use tokio::net::TcpListener;

use crate::cookies::{read_cookie, MemoryCookieStore};

#[derive(Clone, Default)]
struct ServerState {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

async fn set_name(Form(form): Form<SetNameForm>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, format!("sender-name={}; Path=/", form.name))],
        Redirect::to("/feed"),
    )
}

async fn send(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Form(form): Form<SendMessageForm>,
) -> axum::response::Response {
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let Some(sender) = read_cookie(cookie_header, "sender-name") else {
        return Redirect::to("/").into_response();
    };
    state
        .sent
        .lock()
        .expect("sent lock")
        .push((sender, form.contents));
    AxumStatus::OK.into_response()
}

async fn spawn_server() -> (String, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/setname", post(set_name))
        .route("/send", post(send))
        .with_state(state.clone());
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });
    (format!("http://{addr}"), state)
}

fn actions_for(server_url: &str) -> (ChatActions, IdentityResolver) {
    let identity = IdentityResolver::new(Arc::new(MemoryCookieStore::new()));
    let settings = ClientSettings {
        server_url: server_url.to_string(),
        ..ClientSettings::default()
    };
    (
        ChatActions::new(&settings, identity.clone()).expect("actions"),
        identity,
    )
}

#[tokio::test]
async fn set_name_stores_cookie_and_send_uses_it() {
    let (server_url, state) = spawn_server().await;
    let (actions, identity) = actions_for(&server_url);

    actions.set_name("  ana ").await.expect("set name");
    assert_eq!(identity.sender_name().as_deref(), Some("ana"));

    actions.send_message("hello **world**").await.expect("send");
    assert_eq!(
        state.sent.lock().expect("sent lock").clone(),
        vec![("ana".to_string(), "hello **world**".to_string())]
    );
}

#[tokio::test]
async fn send_without_identity_reports_redirect_status() {
    let (server_url, state) = spawn_server().await;
    let (actions, _identity) = actions_for(&server_url);

    let err = actions.send_message("hi").await.expect_err("must fail");

    assert!(matches!(err, ActionError::Status(status) if status.is_redirection()));
    assert!(state.sent.lock().expect("sent lock").is_empty());
}

#[tokio::test]
async fn blank_input_is_rejected_locally() {
    let (actions, _identity) = actions_for("http://127.0.0.1:9");

    assert!(matches!(
        actions.send_message("   ").await,
        Err(ActionError::EmptyMessage)
    ));
    assert!(matches!(actions.set_name("").await, Err(ActionError::EmptyName)));
}
