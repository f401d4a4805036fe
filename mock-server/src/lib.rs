use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query},
    http::{
        header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE},
        HeaderMap, HeaderValue, Method, StatusCode, Uri,
    },
    response::{AppendHeaders, IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Everything the server saw of a request, as returned by `/inspect`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Inspection {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub body_len: usize,
}

/// One part of a multipart upload, as returned by `/upload`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadedPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub size: usize,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlowParams {
    #[serde(default = "default_delay_ms")]
    pub ms: u64,
}

fn default_delay_ms() -> u64 {
    2000
}

pub fn app() -> Router {
    Router::new()
        .route("/inspect", any(inspect))
        .route("/echo", any(echo))
        .route("/redirect", any(redirect))
        .route("/upload", post(upload))
        .route("/cookies", get(cookies))
        .route("/cookies/set", get(set_cookies))
        .route("/cookies/redirect", get(redirect_to_nested_cookie))
        .route("/cookies/nested/set", get(set_nested_cookie))
        .route("/slow", get(slow))
        .route("/xml", get(xml))
        .route("/status/{code}", any(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn inspect(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Inspection> {
    let mut seen = BTreeMap::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(", ");
        seen.insert(name.as_str().to_string(), joined);
    }
    tracing::debug!(%method, %uri, "inspect");
    Json(Inspection {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: seen,
        body: String::from_utf8_lossy(&body).into_owned(),
        body_len: body.len(),
    })
}

async fn echo(headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    ([(CONTENT_TYPE, content_type)], body).into_response()
}

async fn redirect() -> impl IntoResponse {
    (StatusCode::FOUND, [(LOCATION, "/inspect")])
}

async fn upload(mut multipart: Multipart) -> Result<Json<Vec<UploadedPart>>, StatusCode> {
    let mut parts = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        let text = if file_name.is_none() {
            Some(String::from_utf8_lossy(&data).into_owned())
        } else {
            None
        };
        parts.push(UploadedPart {
            name,
            file_name,
            content_type,
            size: data.len(),
            text,
        });
    }
    Ok(Json(parts))
}

async fn cookies(headers: HeaderMap) -> String {
    headers
        .get(COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn set_cookies() -> impl IntoResponse {
    (
        AppendHeaders([
            (SET_COOKIE, "session=abc123; Path=/"),
            (SET_COOKIE, "theme=dark; Path=/"),
            (SET_COOKIE, "tracker=1; Domain=tracker.example"),
        ]),
        "cookies set",
    )
}

async fn redirect_to_nested_cookie() -> impl IntoResponse {
    (StatusCode::FOUND, [(LOCATION, "/cookies/nested/set")])
}

async fn set_nested_cookie() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, "nested=1; Path=/cookies/nested")]),
        "nested cookie set",
    )
}

async fn slow(Query(params): Query<SlowParams>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(params.ms)).await;
    "finally"
}

async fn xml() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "application/xml")],
        "<Point><x>3</x><y>4</y></Point>",
    )
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}
