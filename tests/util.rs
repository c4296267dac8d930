#![allow(unused)]

use actix_http::{body::MessageBody, header::AUTHORIZATION, Method, Request, StatusCode};
use actix_web::{
    dev::{Service, ServiceResponse},
    http::header::LOCATION,
    test::{call_service, read_body, TestRequest},
};
use anyhow::Result;
use checkout_client::Memory;
use givebox::{
    setting::{Gateway, Setting},
    AppState, NewUser,
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, Database};
use serde_json::{json, Value};

pub const ADMIN_EMAIL: &str = "admin@ngo.org";

pub fn test_setting() -> Setting {
    let mut setting = Setting::default();
    setting.gateway = Gateway::Memory;
    setting.auth.bcrypt_cost = 4;
    setting.auth.secret = "givebox test secret".to_owned();
    setting.auth.admins = vec![ADMIN_EMAIL.to_owned()];
    setting
}

/// state on a fresh in-memory sqlite db and the memory checkout gateway
pub async fn create_test_state_with(setting: Setting) -> Result<(AppState, Memory)> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_owned());
    // one connection, one database
    options.max_connections(1).min_connections(1);
    let conn = Database::connect(options).await?;
    Migrator::up(&conn, None).await?;
    let memory = Memory::new();
    let state = AppState::new(setting, "memory".to_owned(), Box::new(memory.clone()), conn);
    Ok((state, memory))
}

pub async fn create_test_state() -> Result<(AppState, Memory)> {
    create_test_state_with(test_setting()).await
}

pub fn new_user(name: &str, email: &str) -> NewUser {
    NewUser {
        name: name.to_owned(),
        email: email.to_owned(),
        password: "secret123".to_owned(),
        phone: Some("+91 98765 43210".to_owned()),
    }
}

pub fn auth_get(path: &str, token: &str) -> TestRequest {
    TestRequest::with_uri(path).insert_header((AUTHORIZATION, format!("Bearer {}", token)))
}

pub fn get(path: &str) -> TestRequest {
    TestRequest::with_uri(path)
}

pub fn auth_post(path: &str, token: &str, data: Value) -> TestRequest {
    post(path, data).insert_header((AUTHORIZATION, format!("Bearer {}", token)))
}

pub fn post(path: &str, data: Value) -> TestRequest {
    TestRequest::with_uri(path)
        .method(Method::POST)
        .set_json(data)
}

pub async fn call<S, B>(req: TestRequest, app: &S) -> (Value, StatusCode)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = call_service(app, req.to_request()).await;
    let status = res.status();
    let body = read_body(res).await;
    let val = serde_json::from_slice::<Value>(&body).unwrap_or(Value::Null);
    (val, status)
}

/// status and location header of a redirect
pub async fn redirect<S, B>(req: TestRequest, app: &S) -> (StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = call_service(app, req.to_request()).await;
    let location = res
        .headers()
        .get(LOCATION)
        .and_then(|l| l.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    (res.status(), location)
}

/// register through the api and return a bearer token
pub async fn register_login<S, B>(app: &S, name: &str, email: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (_, status) = call(
        post(
            "/register",
            json!({
                "name": name,
                "email": email,
                "password": "secret123",
                "phone": "12345",
            }),
        ),
        app,
    )
    .await;
    assert_eq!(status, 201);
    let (val, status) = call(
        post(
            "/login",
            json!({
                "email": email,
                "password": "secret123",
            }),
        ),
        app,
    )
    .await;
    assert_eq!(status, 200);
    val["token"].as_str().unwrap().to_owned()
}

/// path and query of an absolute url, for replaying gateway redirects
pub fn path_of(url: &str) -> String {
    let url = url::Url::parse(url).unwrap();
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_owned(),
    }
}
