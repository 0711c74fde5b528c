use crate::catalog::{
    COLUMN_ALIASES, CatalogField, ColumnAliasTable, IngestError, ParsedCatalog, RowSource,
    SourceRows, build_catalog, source_for,
};
use crate::models::{CatalogResponse, DebugInfo, UploadRequest};
use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use std::{env, sync::Arc, time::Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Standard alphabet, padding optional.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Clone)]
pub struct Pipeline {
    pub config: Arc<PipelineConfig>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Decodes the upload, reads its rows and builds the catalog response.
    pub fn run(
        &self,
        upload: UploadRequest,
        request_id: &str,
    ) -> Result<CatalogResponse, PipelineError> {
        let filename = upload.filename.unwrap_or_default();
        let file_data = upload.file_data.unwrap_or_default();

        let bytes = capture_stage("decode_payload", || stages::decode_payload(&file_data))?;
        let source = source_for(&filename, bytes);
        let rows = capture_stage("read_rows", || stages::read_rows(source.as_ref()))?;
        debug!(
            target = "catalog.parser",
            request_id,
            columns = ?self.config.aliases.detect_columns(&rows.headers),
            "column mapping"
        );
        let catalog = capture_stage("build_catalog", || {
            Ok(build_catalog(&self.config.aliases, &rows.rows))
        })?;

        info!(
            target = "catalog.parser",
            request_id,
            filename = %filename,
            source = %source.describe(),
            rows = catalog.rows_read,
            products = catalog.total_products(),
            categories = catalog.categories.len(),
            "catalog parsed"
        );

        Ok(respond(catalog, filename, request_id))
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

#[derive(Clone)]
pub struct PipelineConfig {
    pub aliases: Arc<ColumnAliasTable>,
}

impl PipelineConfig {
    /// Built-in aliases plus any listed in `CATALOG_EXTRA_ALIASES`
    /// (`field:Header` pairs separated by commas, e.g. `name:Товар,brand:Производитель`).
    pub fn from_env() -> Self {
        let raw = env::var("CATALOG_EXTRA_ALIASES").unwrap_or_default();
        Self {
            aliases: Arc::new(extend_aliases(COLUMN_ALIASES.clone(), &raw)),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aliases: Arc::new(COLUMN_ALIASES.clone()),
        }
    }
}

fn extend_aliases(mut table: ColumnAliasTable, raw: &str) -> ColumnAliasTable {
    let mut added = 0usize;
    for token in raw.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let mut parts = trimmed.splitn(2, ':');
        let field = parts.next().and_then(CatalogField::from_canonical_name);
        let header = parts.next().map(str::trim).filter(|s| !s.is_empty());
        match (field, header) {
            (Some(field), Some(header)) => {
                table = table.with_alias(field, header);
                added += 1;
            }
            _ => warn!(
                target = "catalog.parser",
                "ignored malformed CATALOG_EXTRA_ALIASES entry: {trimmed}"
            ),
        }
    }
    if added > 0 {
        info!(
            target = "catalog.parser",
            alias_count = added,
            "loaded extra column aliases from env"
        );
    }
    table
}

fn respond(catalog: ParsedCatalog, filename: String, request_id: &str) -> CatalogResponse {
    let message = catalog.summary();
    let total_products = catalog.total_products();
    CatalogResponse {
        success: true,
        products: catalog.products,
        categories: catalog.categories,
        total_products,
        filename,
        processed_at: request_id.to_string(),
        message,
    }
}

fn capture_stage<T>(
    name: &'static str,
    stage: impl FnOnce() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    let started = Instant::now();
    let outcome = stage();
    crate::metrics::stage_elapsed(name, started.elapsed());
    if let Err(err) = &outcome {
        warn!(target = "catalog.parser", stage = name, error = %err, "stage failed");
    }
    outcome
}

pub mod stages {
    use super::*;

    pub fn decode_payload(file_data: &str) -> Result<Vec<u8>, PipelineError> {
        if file_data.trim().is_empty() {
            return Err(PipelineError::invalid_input(
                "decode_payload",
                "No file data provided",
            ));
        }
        let encoded = match file_data.split_once(',') {
            Some((_, rest)) => rest,
            None => file_data,
        };
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        PAYLOAD_ENGINE.decode(compact.as_bytes()).map_err(|err| {
            PipelineError::invalid_input(
                "decode_payload",
                format!("Ошибка декодирования файла: {err}"),
            )
        })
    }

    pub fn read_rows(source: &dyn RowSource) -> Result<SourceRows, PipelineError> {
        let rows = source.read_rows().map_err(format_error)?;
        if rows.rows.is_empty() {
            return Err(PipelineError::invalid_input(
                "read_rows",
                "Файл пустой или не содержит данных",
            )
            .with_debug(DebugInfo {
                delimiter: Some(source.describe()),
                column_names: Some(rows.headers.clone()),
                rows_count: Some(0),
                ..Default::default()
            }));
        }
        Ok(rows)
    }

    fn format_error(err: IngestError) -> PipelineError {
        let message = format!("Ошибка парсинга файла: {err}");
        match err {
            IngestError::Delimited {
                delimiter,
                preview,
                content_length,
                ..
            } => PipelineError::invalid_input("read_rows", message).with_debug(DebugInfo {
                delimiter: Some(delimiter.to_string()),
                content_preview: Some(preview),
                content_length: Some(content_length),
                ..Default::default()
            }),
            IngestError::Workbook(_) | IngestError::NoWorksheet => {
                PipelineError::invalid_input("read_rows", message)
            }
        }
    }
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct PipelineError {
    stage: &'static str,
    message: String,
    kind: PipelineErrorKind,
    debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineErrorKind {
    InvalidInput,
    Internal,
}

impl PipelineError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::InvalidInput,
            debug: None,
        }
    }

    pub fn internal(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: PipelineErrorKind::Internal,
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: DebugInfo) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> PipelineErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }

    pub fn debug_info(&self) -> Option<&DebugInfo> {
        self.debug.as_ref()
    }
}
