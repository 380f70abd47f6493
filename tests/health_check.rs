//! Smoke tests against a spawned server backed by the in-memory store

use std::net::TcpListener;
use std::sync::Arc;

use spotted_auth::auth::{AuthService, JwtTokenService};
use spotted_auth::configuration::ApplicationSettings;
use spotted_auth::startup::run;
use spotted_auth::store::InMemoryCredentialStore;

const SECRET: &[u8] = b"test-secret-key-at-least-32-characters-long";

fn spawn_app() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let store = InMemoryCredentialStore::with_hash_cost(4);
    store
        .add_user("a@b.com", "secret", "verified")
        .expect("Failed to add user");
    let auth = AuthService::new(Arc::new(JwtTokenService::new(SECRET)), Arc::new(store));
    let settings = ApplicationSettings {
        host: "127.0.0.1".to_string(),
        port,
        login_path: "/login".to_string(),
        home_path: "/".to_string(),
        required_role: "verified".to_string(),
    };

    let server = run(listener, auth, settings).expect("Failed to create server");
    let _ = tokio::spawn(server);

    format!("http://127.0.0.1:{}", port)
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app();

    let response = client()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn login_sets_both_token_cookies() {
    let addr = spawn_app();

    let response = client()
        .post(&format!("{}/auth/login", addr))
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body("email=a%40b.com&password=secret")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(200, response.status().as_u16());
    assert_eq!("/", response.headers().get("HX-Location").unwrap().to_str().unwrap());

    let cookies: Vec<String> = response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(2, cookies.len());
    assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.contains("Secure")));
}

#[tokio::test]
async fn protected_route_redirects_anonymous_client_to_login() {
    let addr = spawn_app();

    let response = client()
        .get(&format!("{}/api/session", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(303, response.status().as_u16());
    assert_eq!("/login", response.headers().get("Location").unwrap().to_str().unwrap());
}

#[tokio::test]
async fn refresh_returns_400_for_missing_body_field() {
    let addr = spawn_app();

    let test_cases = vec![
        (serde_json::json!({}), "missing refresh_token"),
        (serde_json::json!({ "refresh_token": "" }), "empty refresh_token"),
    ];

    for (body, description) in test_cases {
        let response = client()
            .post(&format!("{}/auth/refresh", addr))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 Bad Request when the payload was {}.",
            description
        );
    }
}
