//! `POST /predict`: plant image upload to growth-stage analysis.

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::Json;

use crate::analysis::AnalysisResult;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::upload::{validate_filename, StagedUpload, UploadError};

/// Multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Read the `file` field. The filename is validated before the body is
/// buffered; other fields are skipped.
pub(crate) async fn read_file_field(multipart: &mut Multipart) -> Result<(String, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or("").to_string();
        validate_filename(&filename)?;
        let bytes = field.bytes().await?;
        return Ok((filename, bytes));
    }
    Err(UploadError::NoFile.into())
}

/// Validate and stage the uploaded image, then hand it to the analysis
/// service. The staged file is gone by the time the response is sent.
pub async fn predict(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<AnalysisResult>, ApiError> {
    let (filename, bytes) = read_file_field(&mut multipart).await?;

    let staged = StagedUpload::stage(&ctx.upload_dir, &filename, &bytes)?;
    tracing::info!(
        filename = staged.filename(),
        size = staged.size(),
        mime = staged.mime(),
        "Processing upload"
    );

    let result = ctx.service.analyze(staged).await?;
    Ok(Json(result))
}
