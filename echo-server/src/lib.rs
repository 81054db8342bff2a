use std::collections::BTreeMap;

use axum::{
    body::{to_bytes, Bytes},
    extract::{FromRequest, Multipart, Path, Request},
    http::{header, HeaderMap, StatusCode},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::debug;

/// What the server saw, returned as the JSON response body.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Echo {
    pub method: String,
    pub url: String,
    pub args: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub data: String,
    pub json: Option<serde_json::Value>,
    pub form: BTreeMap<String, String>,
    pub files: BTreeMap<String, UploadedFile>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: String,
}

type Rejection = (StatusCode, String);

pub fn app() -> Router {
    Router::new()
        .route("/get", any(echo))
        .route("/post", any(echo))
        .route("/put", any(echo))
        .route("/patch", any(echo))
        .route("/delete", any(echo))
        .route("/anything", any(echo))
        .route("/anything/{*rest}", any(echo))
        .route("/status/{code}", get(status).post(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(request: Request) -> Result<Json<Echo>, Rejection> {
    let method = request.method().to_string();
    let uri = request.uri().clone();
    let headers = request.headers().clone();
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");

    let mut echo = Echo {
        method,
        url: format!("http://{host}{uri}"),
        args: uri
            .query()
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default(),
        headers: header_map(&headers),
        ..Echo::default()
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        read_multipart(request, &mut echo).await?;
    } else {
        let body = to_bytes(request.into_body(), usize::MAX)
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        read_body(&content_type, &body, &mut echo);
    }

    debug!(method = %echo.method, url = %echo.url, "echoed request");
    Ok(Json(echo))
}

fn read_body(content_type: &str, body: &Bytes, echo: &mut Echo) {
    if content_type.starts_with("application/x-www-form-urlencoded") {
        echo.form = url::form_urlencoded::parse(body).into_owned().collect();
        return;
    }
    echo.data = String::from_utf8_lossy(body).into_owned();
    if content_type.starts_with("application/json") {
        echo.json = serde_json::from_slice(body).ok();
    }
}

async fn read_multipart(request: Request, echo: &mut Echo) -> Result<(), Rejection> {
    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
        let content = String::from_utf8_lossy(&content).into_owned();

        match filename {
            Some(filename) => {
                echo.files.insert(
                    name,
                    UploadedFile {
                        filename: Some(filename),
                        content_type,
                        content,
                    },
                );
            }
            None => {
                echo.form.insert(name, content);
            }
        }
    }
    Ok(())
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}
