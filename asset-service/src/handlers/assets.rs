use crate::error::AssetError;
use crate::models::{DecodedImage, GenerationSettings, GLB_MIME_TYPE};
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use service_core::error::AppError;
use std::collections::HashMap;
use validator::Validate;

pub const CACHE_STATUS_HEADER: &str = "x-asset-cache";

const IMAGE_FIELD: &str = "image_file";

/// Upload parsed into the image bytes and the effective settings.
struct AssetRequest {
    image: Bytes,
    settings: GenerationSettings,
}

/// Read the multipart body.
///
/// Settings start from their defaults, then take the query string, then text
/// fields with the same names in the form. Both sources are parsed the same
/// way so a bad value is reported identically wherever it came from.
async fn read_asset_request(
    query: HashMap<String, String>,
    mut multipart: Multipart,
) -> Result<AssetRequest, AppError> {
    let mut settings = GenerationSettings::default();
    for (name, value) in &query {
        apply_setting(&mut settings, name, value)?;
    }

    let mut image = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == IMAGE_FIELD {
            image = Some(field.bytes().await.map_err(multipart_error)?);
        } else if is_setting(&name) {
            let value = field.text().await.map_err(multipart_error)?;
            apply_setting(&mut settings, &name, &value)?;
        } else {
            tracing::debug!(field = %name, "Ignoring unknown multipart field");
        }
    }

    let image = image.ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!("Missing '{}' file field", IMAGE_FIELD))
    })?;

    settings.validate()?;

    Ok(AssetRequest { image, settings })
}

fn is_setting(name: &str) -> bool {
    matches!(
        name,
        "seed" | "sparse_structure_sampler_steps" | "sparse_structure_sampler_cfg_strength"
    )
}

/// Overwrite one named setting. Unknown names are ignored.
fn apply_setting(
    settings: &mut GenerationSettings,
    name: &str,
    value: &str,
) -> Result<(), AppError> {
    match name {
        "seed" => settings.seed = parse_field(name, value)?,
        "sparse_structure_sampler_steps" => {
            settings.sparse_structure_sampler_steps = parse_field(name, value)?
        }
        "sparse_structure_sampler_cfg_strength" => {
            settings.sparse_structure_sampler_cfg_strength = parse_field(name, value)?
        }
        _ => {}
    }
    Ok(())
}

fn parse_field<T>(name: &str, value: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        AppError::BadRequest(anyhow::anyhow!("Invalid value for '{}': {}", name, e))
    })
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(anyhow::anyhow!("Upload exceeds the size limit"))
    } else {
        AppError::BadRequest(anyhow::anyhow!("Failed to read multipart body: {}", e))
    }
}

fn glb_response(bytes: Bytes, cache_status: &'static str) -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(GLB_MIME_TYPE)),
            (
                HeaderName::from_static(CACHE_STATUS_HEADER),
                HeaderValue::from_static(cache_status),
            ),
        ],
        bytes,
    )
}

/// Upload an image and create a 3D GLB asset from it.
///
/// Identical image pixels with identical settings are answered from the
/// cache without running the pipeline again.
pub async fn asset_from_image(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let request = read_asset_request(query, multipart).await?;
    let image = DecodedImage::decode(request.image).map_err(AssetError::from)?;

    tracing::info!(
        width = image.width(),
        height = image.height(),
        seed = request.settings.seed,
        steps = request.settings.sparse_structure_sampler_steps,
        cfg_strength = request.settings.sparse_structure_sampler_cfg_strength,
        "Asset requested"
    );

    let asset = state
        .generator
        .get_or_generate(&request.settings, &image)
        .await?;

    Ok(glb_response(asset.bytes, asset.cache.as_str()))
}

/// Return the stored sample asset regardless of the upload.
///
/// Lets consumers exercise the integration without GPU cost. The image is
/// still decoded so malformed uploads fail the same way as on the real
/// endpoint.
pub async fn asset_from_storage(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let request = read_asset_request(query, multipart).await?;
    let image = DecodedImage::decode(request.image).map_err(AssetError::from)?;
    tracing::info!(
        width = image.width(),
        height = image.height(),
        "Read image for sample asset"
    );

    let seed = request.settings.resolve_seed();
    tracing::info!(seed, "Resolved seed (unused)");

    let bytes = state.sample.load().await.map_err(|e| {
        tracing::error!(
            path = %state.sample.path().display(),
            error = %e,
            "Failed to load sample asset"
        );
        e
    })?;

    Ok(glb_response(bytes, "bypass"))
}
