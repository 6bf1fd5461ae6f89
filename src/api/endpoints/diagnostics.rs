//! `POST /test-workflow`: run the detector on an image and return its raw,
//! uninterpreted output.
//!
//! Accepts either a multipart upload (`file` field, same validation as
//! `/predict`) or a JSON body `{"url": "..."}` pointing at a public image.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::Json;
use serde::Deserialize;

use crate::api::endpoints::predict::read_file_field;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::detector::ImageInput;
use crate::service::ProbeResult;
use crate::upload::StagedUpload;

#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub url: Option<String>,
}

pub async fn test_workflow(
    State(ctx): State<ApiContext>,
    request: Request,
) -> Result<Json<ProbeResult>, ApiError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let (input, staged) = if is_multipart {
        let mut multipart = Multipart::from_request(request, &ctx)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let (filename, bytes) = read_file_field(&mut multipart).await?;
        let staged = StagedUpload::stage(&ctx.upload_dir, &filename, &bytes)?;
        tracing::info!(filename = staged.filename(), "Testing workflow with uploaded file");
        (ImageInput::File(staged.to_path_buf()), Some(staged))
    } else {
        let Json(body) = Json::<ProbeRequest>::from_request(request, &ctx)
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        let url = body
            .url
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("No image URL provided".into()))?;
        tracing::info!(url = %url, "Testing workflow with image URL");
        (ImageInput::Url(url), None)
    };

    let result = ctx.service.probe(input, staged).await?;
    Ok(Json(result))
}
