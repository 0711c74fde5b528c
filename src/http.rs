//! Serverless-style request envelope around the catalog pipeline.
//!
//! The hosting runtime hands over `{ httpMethod, body }` and expects
//! `{ statusCode, headers, body, isBase64Encoded }` back. Every response
//! allows any origin.

use crate::models::{ApiError, UploadRequest};
use crate::pipeline::{Pipeline, PipelineError, PipelineErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_METHODS: &str = "POST, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, X-User-Id, X-Auth-Token, X-Session-Id";
pub const MAX_AGE: &str = "86400";

const FALLBACK_ERROR_BODY: &str = r#"{"success":false,"error":"Внутренняя ошибка сервера"}"#;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerEvent {
    #[serde(default = "default_method")]
    pub http_method: String,
    #[serde(default)]
    pub body: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlerResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl HandlerResponse {
    fn new(status_code: u16, body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Access-Control-Allow-Origin".to_string(),
            ALLOW_ORIGIN.to_string(),
        );
        Self {
            status_code,
            headers,
            body,
            is_base64_encoded: false,
        }
    }

    fn json<T: Serialize>(status_code: u16, payload: &T) -> Self {
        match serde_json::to_string(payload) {
            Ok(body) => {
                Self::new(status_code, body).with_header("Content-Type", "application/json")
            }
            Err(err) => {
                error!(target = "catalog.api", error = %err, "response serialization failed");
                Self::new(500, FALLBACK_ERROR_BODY.to_string())
                    .with_header("Content-Type", "application/json")
            }
        }
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }

    pub fn preflight() -> Self {
        Self::new(200, String::new())
            .with_header("Access-Control-Allow-Methods", ALLOW_METHODS)
            .with_header("Access-Control-Allow-Headers", ALLOW_HEADERS)
            .with_header("Access-Control-Max-Age", MAX_AGE)
    }

    pub fn method_not_allowed() -> Self {
        Self::json(405, &ApiError::new("Method not allowed"))
    }

    /// Maps a pipeline failure onto its status code and error payload.
    pub fn from_error(err: &PipelineError, request_id: &str) -> Self {
        let status = match err.kind() {
            PipelineErrorKind::InvalidInput => 400,
            PipelineErrorKind::Internal => 500,
        };
        warn!(
            target = "catalog.api",
            request_id,
            stage = err.stage(),
            status,
            "catalog request rejected"
        );
        let mut payload = ApiError::new(err.detail());
        payload.debug_info = err.debug_info().cloned();
        if err.kind() == PipelineErrorKind::Internal {
            payload.request_id = Some(request_id.to_string());
        }
        Self::json(status, &payload)
    }

    /// 400 for a request body that cannot be read as upload JSON.
    pub fn invalid_body(detail: impl std::fmt::Display, request_id: &str) -> Self {
        let err = PipelineError::invalid_input(
            "parse_body",
            format!("Некорректное тело запроса: {detail}"),
        );
        Self::from_error(&err, request_id)
    }

    /// 500 for failures outside the pipeline itself, such as a crashed worker.
    pub fn internal(detail: impl std::fmt::Display, request_id: &str) -> Self {
        let err = PipelineError::internal(
            "handler",
            format!("Внутренняя ошибка сервера: {detail}"),
        );
        Self::from_error(&err, request_id)
    }
}

/// Dispatches one event. Never fails: every outcome is an envelope.
pub fn handle(pipeline: &Pipeline, event: &HandlerEvent, request_id: &str) -> HandlerResponse {
    let method = event.http_method.trim();
    if method.eq_ignore_ascii_case("OPTIONS") {
        return HandlerResponse::preflight();
    }
    if !method.eq_ignore_ascii_case("POST") {
        return HandlerResponse::method_not_allowed();
    }

    let raw_body = event
        .body
        .as_deref()
        .filter(|b| !b.trim().is_empty())
        .unwrap_or("{}");
    let upload: UploadRequest = match serde_json::from_str(raw_body) {
        Ok(upload) => upload,
        Err(err) => return HandlerResponse::invalid_body(err, request_id),
    };

    match pipeline.run(upload, request_id) {
        Ok(result) => {
            info!(
                target = "catalog.api",
                request_id,
                products = result.total_products,
                "catalog request served"
            );
            HandlerResponse::json(200, &result)
        }
        Err(err) => HandlerResponse::from_error(&err, request_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde_json::{Value, json};

    fn post(body: Value) -> HandlerEvent {
        HandlerEvent {
            http_method: "POST".into(),
            body: Some(body.to_string()),
        }
    }

    fn body_json(response: &HandlerResponse) -> Value {
        serde_json::from_str(&response.body).expect("json body")
    }

    #[test]
    fn options_returns_cors_preflight() {
        let event = HandlerEvent {
            http_method: "OPTIONS".into(),
            body: Some("not even json".into()),
        };
        let response = handle(&Pipeline::default(), &event, "req");
        assert_eq!(response.status_code, 200);
        assert!(response.body.is_empty());
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        assert_eq!(response.headers["Access-Control-Allow-Methods"], "POST, OPTIONS");
        assert_eq!(
            response.headers["Access-Control-Allow-Headers"],
            "Content-Type, X-User-Id, X-Auth-Token, X-Session-Id"
        );
        assert_eq!(response.headers["Access-Control-Max-Age"], "86400");
        assert!(!response.is_base64_encoded);
    }

    #[test]
    fn other_methods_are_rejected() {
        let event = HandlerEvent {
            http_method: "GET".into(),
            body: None,
        };
        let response = handle(&Pipeline::default(), &event, "req");
        assert_eq!(response.status_code, 405);
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        let body = body_json(&response);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Method not allowed"));
    }

    #[test]
    fn missing_file_data_is_400() {
        let response = handle(&Pipeline::default(), &post(json!({"filename": "a.csv"})), "req");
        assert_eq!(response.status_code, 400);
        assert_eq!(body_json(&response)["error"], json!("No file data provided"));

        let event = HandlerEvent {
            http_method: "POST".into(),
            body: None,
        };
        assert_eq!(handle(&Pipeline::default(), &event, "req").status_code, 400);
    }

    #[test]
    fn malformed_base64_is_400() {
        let response = handle(
            &Pipeline::default(),
            &post(json!({"fileData": "data:text/csv;base64,%%%%", "filename": "a.csv"})),
            "req",
        );
        assert_eq!(response.status_code, 400);
        let body = body_json(&response);
        assert_eq!(body["success"], json!(false));
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Ошибка декодирования файла")
        );
        assert!(body.get("request_id").is_none());
    }

    #[test]
    fn invalid_body_json_is_400() {
        let event = HandlerEvent {
            http_method: "POST".into(),
            body: Some("{not json".into()),
        };
        let response = handle(&Pipeline::default(), &event, "req");
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn invalid_body_is_400_without_request_id() {
        let response = HandlerResponse::invalid_body("invalid utf-8 sequence", "req");
        assert_eq!(response.status_code, 400);
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        let body = body_json(&response);
        assert_eq!(
            body["error"],
            json!("Некорректное тело запроса: invalid utf-8 sequence")
        );
        assert!(body.get("request_id").is_none());
    }

    #[test]
    fn empty_file_reports_debug_info() {
        let data = STANDARD.encode("Наименование,Бренд\n");
        let response = handle(
            &Pipeline::default(),
            &post(json!({"fileData": data, "filename": "a.csv"})),
            "req",
        );
        assert_eq!(response.status_code, 400);
        let body = body_json(&response);
        assert_eq!(body["debug_info"]["delimiter"], json!(","));
        assert_eq!(body["debug_info"]["rows_count"], json!(0));
        assert_eq!(
            body["debug_info"]["column_names"],
            json!(["Наименование", "Бренд"])
        );
    }

    #[test]
    fn success_envelope() {
        let data = STANDARD.encode("Наименование,Бренд,Цена дилер\nЛинейка,,45.5\n");
        let response = handle(
            &Pipeline::default(),
            &post(json!({"fileData": data, "filename": "catalog.csv"})),
            "req-42",
        );
        assert_eq!(response.status_code, 200);
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(response.headers["Access-Control-Allow-Origin"], "*");
        let body = body_json(&response);
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["total_products"], json!(1));
        assert_eq!(body["filename"], json!("catalog.csv"));
        assert_eq!(body["processed_at"], json!("req-42"));
        assert_eq!(body["categories"], json!(["Канцтовары"]));
        assert_eq!(body["products"][0]["price"], json!(45.5));
        assert_eq!(body["products"][0]["id"], json!("item_0"));
    }

    #[test]
    fn internal_errors_carry_request_id() {
        let response = HandlerResponse::internal("worker panicked", "req-9");
        assert_eq!(response.status_code, 500);
        let body = body_json(&response);
        assert_eq!(body["request_id"], json!("req-9"));
        assert_eq!(
            body["error"],
            json!("Внутренняя ошибка сервера: worker panicked")
        );
    }

    #[test]
    fn event_defaults_to_post() {
        let event: HandlerEvent = serde_json::from_str(r#"{"body": "{}"}"#).unwrap();
        assert_eq!(event.http_method, "POST");
    }
}
