#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

use axum::{
    Router,
    body::{Body, Bytes},
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use biomedlink::{config::Config, routes::build_router, state::AppState};

static NEXT_IP: AtomicU8 = AtomicU8::new(1);

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        let state = AppState::in_memory(&Config::for_tests()).await.unwrap();
        Self::with_state(state)
    }

    pub fn with_state(state: AppState) -> Self {
        let router = build_router(state.clone()).unwrap();
        Self { state, router }
    }

    /// A fresh browser: empty cookie jar, its own client IP.
    pub fn browser(&self) -> Browser {
        let octet = NEXT_IP.fetch_add(1, Ordering::Relaxed);
        Browser {
            router: self.router.clone(),
            cookies: HashMap::new(),
            addr: SocketAddr::from(([10, 0, 0, octet], 40000)),
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
    }

    pub fn assert_redirect(&self, to: &str) {
        assert_eq!(self.status, StatusCode::SEE_OTHER, "body: {:?}", self.body);
        assert_eq!(self.location(), Some(to));
    }
}

pub struct Browser {
    router: Router,
    cookies: HashMap<String, String>,
    addr: SocketAddr,
}

impl Browser {
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    fn store_cookies(&mut self, headers: &HeaderMap) {
        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(value) = value.to_str() else { continue };
            let expired = value.to_ascii_lowercase().contains("max-age=0");
            let Some((name, value)) = value.split(';').next().and_then(|pair| pair.split_once('='))
            else {
                continue;
            };
            if expired || value.is_empty() {
                self.cookies.remove(name.trim());
            } else {
                self.cookies.insert(name.trim().to_string(), value.trim().to_string());
            }
        }
    }

    async fn dispatch(&mut self, builder: http::request::Builder, body: Body, with_csrf: bool) -> TestResponse {
        let mut builder = builder;
        if !self.cookies.is_empty() {
            let cookie_header = self
                .cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            builder = builder.header(header::COOKIE, cookie_header);
        }
        if with_csrf {
            if let Some(csrf) = self.cookies.get("csrf_token") {
                builder = builder.header("x-csrf-token", csrf.clone());
            }
        }

        let mut request = builder.body(body).unwrap();
        request.extensions_mut().insert(ConnectInfo(self.addr));

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();

        self.store_cookies(&headers);
        TestResponse { status, headers, body }
    }

    pub async fn get(&mut self, path: &str) -> TestResponse {
        self.dispatch(Request::builder().method(Method::GET).uri(path), Body::empty(), false)
            .await
    }

    pub async fn post_json(&mut self, path: &str, body: Value) -> TestResponse {
        let builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        self.dispatch(builder, Body::from(body.to_string()), true).await
    }

    /// Same as [`Browser::post_json`] but never sends the CSRF header.
    pub async fn post_json_without_csrf(&mut self, path: &str, body: Value) -> TestResponse {
        let builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");
        self.dispatch(builder, Body::from(body.to_string()), false).await
    }

    pub async fn delete(&mut self, path: &str) -> TestResponse {
        self.dispatch(Request::builder().method(Method::DELETE).uri(path), Body::empty(), true)
            .await
    }

    /// Posts `multipart/form-data`. Parts with a filename are sent as files.
    pub async fn post_multipart(&mut self, path: &str, parts: &[Part<'_>]) -> TestResponse {
        const BOUNDARY: &str = "biomedlink-test-boundary";
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part.filename {
                Some(filename) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                        part.name, filename
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(part.data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            );
        self.dispatch(builder, Body::from(body), true).await
    }

    pub async fn register(&mut self, email: &str, password: &str, role: &str) -> TestResponse {
        self.post_json(
            "/api/auth/register",
            serde_json::json!({ "email": email, "password": password, "role": role }),
        )
        .await
    }

    pub async fn login(&mut self, email: &str, password: &str) -> TestResponse {
        self.post_json(
            "/api/auth/login",
            serde_json::json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Registers and logs in, asserting both succeed.
    pub async fn sign_up(&mut self, email: &str, role: &str) -> Value {
        let registered = self.register(email, "pw123", role).await;
        assert_eq!(registered.status, StatusCode::CREATED, "body: {:?}", registered.body);
        let logged_in = self.login(email, "pw123").await;
        assert_eq!(logged_in.status, StatusCode::OK, "body: {:?}", logged_in.body);
        registered.json()["user"].clone()
    }
}

pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

impl<'a> Part<'a> {
    pub fn text(name: &'a str, value: &'a str) -> Self {
        Self {
            name,
            filename: None,
            data: value.as_bytes(),
        }
    }

    pub fn file(name: &'a str, filename: &'a str, data: &'a [u8]) -> Self {
        Self {
            name,
            filename: Some(filename),
            data,
        }
    }
}

pub fn job_card_parts<'a>(equipment: &'a str, date: &'a str) -> Vec<Part<'a>> {
    vec![
        Part::text("equipment_name", equipment),
        Part::text("maintenance_type", "calibration"),
        Part::text("service_date", date),
    ]
}
