use crate::catalog::Product;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Upload payload carried in the handler body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// Base64 file contents, optionally behind a `data:...;base64,` prefix.
    #[serde(default)]
    pub file_data: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogResponse {
    pub success: bool,
    pub products: Vec<Product>,
    pub categories: Vec<String>,
    pub total_products: usize,
    pub filename: String,
    pub processed_at: String,
    pub message: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    pub request_id: Option<String>,
    pub debug_info: Option<DebugInfo>,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            request_id: None,
            debug_info: None,
        }
    }
}

/// Extra context returned when a file cannot be turned into rows.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DebugInfo {
    pub delimiter: Option<String>,
    pub content_preview: Option<String>,
    pub content_length: Option<usize>,
    pub column_names: Option<Vec<String>>,
    pub rows_count: Option<usize>,
}
