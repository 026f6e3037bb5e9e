//! Public listing, upload serving, admin mutations and health.

use axum::body::Body as AxumBody;
use axum::extract::{Extension, Multipart, Path as UrlPath};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Json as JsonResponse, Response};
use chrono::Utc;
use httpdate::fmt_http_date;
use serde::Serialize;
use std::sync::Arc;
use tokio::fs::{self, File};
use tokio_util::io::ReaderStream;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::store::{MediaItem, MediaStore};
use crate::upload::Stager;

/// Wire shape of a media record: the stored fields plus the derived
/// retrieval path.
#[derive(Serialize)]
pub(crate) struct MediaWithUrl {
    #[serde(flatten)]
    item: MediaItem,
    url: String,
}

fn with_url(item: MediaItem) -> MediaWithUrl {
    let url = format!("/uploads/{}", item.filename);
    MediaWithUrl { item, url }
}

/// Lists all media, most recently added first.
pub async fn list_media(
    Extension(store): Extension<Arc<MediaStore>>,
) -> JsonResponse<Vec<MediaWithUrl>> {
    let items = store.media_items().await;
    JsonResponse(items.into_iter().map(with_url).collect())
}

#[derive(Serialize)]
pub(crate) struct UploadResponse {
    success: bool,
    media: MediaWithUrl,
}

/// Accepts one multipart upload: field `file` plus form fields `name`,
/// `category` and optional `description`. The file's declared type is
/// validated before its bytes are read, so rejected uploads never touch disk.
pub async fn upload_media(
    Extension(store): Extension<Arc<MediaStore>>,
    Extension(stager): Extension<Stager>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> Result<JsonResponse<UploadResponse>, ApiError> {
    let mut name = None;
    let mut category = None;
    let mut description = String::new();
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().unwrap_or_default().to_string();
                Stager::validate(&file_name, &content_type)?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            "name" => {
                name = Some(read_text_field(field).await?);
            }
            "category" => {
                category = Some(read_text_field(field).await?);
            }
            "description" => {
                description = read_text_field(field).await?;
            }
            _ => {}
        }
    }

    let Some((file_name, content_type, payload)) = file else {
        return Err(ApiError::BadRequest("file is required".into()));
    };
    let name = name.filter(|v| !v.is_empty());
    let category = category.filter(|v| !v.is_empty());
    let (Some(name), Some(category)) = (name, category) else {
        return Err(ApiError::BadRequest("name and category are required".into()));
    };

    let staged = stager.stage(&file_name, &content_type, &payload).await?;
    let item = MediaItem {
        id: Utc::now().timestamp_millis().to_string(),
        name,
        category,
        description,
        filename: staged.filename,
        kind: staged.kind,
        created_at: Utc::now().to_rfc3339(),
    };
    store.add_media(item.clone()).await?;

    info!(
        username = user.username,
        id = item.id,
        filename = item.filename,
        "media uploaded"
    );
    Ok(JsonResponse(UploadResponse {
        success: true,
        media: with_url(item),
    }))
}

async fn read_text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::BadRequest(err.to_string()))
}

#[derive(Serialize)]
pub(crate) struct DeleteResponse {
    success: bool,
}

/// Removes a media record and its backing file. A missing file is tolerated;
/// an unknown id is not.
pub async fn delete_media(
    UrlPath(id): UrlPath<String>,
    Extension(store): Extension<Arc<MediaStore>>,
    Extension(stager): Extension<Stager>,
    Extension(user): Extension<AuthUser>,
) -> Result<JsonResponse<DeleteResponse>, ApiError> {
    let Some(item) = store.find_media(&id).await else {
        return Err(ApiError::NotFound("media not found".into()));
    };

    stager.remove(&item.filename).await?;
    store.remove_media(&id).await?;

    info!(username = user.username, id, filename = item.filename, "media deleted");
    Ok(JsonResponse(DeleteResponse { success: true }))
}

/// Streams a stored file with its guessed content type.
pub async fn serve_upload(
    UrlPath(filename): UrlPath<String>,
    Extension(stager): Extension<Stager>,
) -> Result<Response, ApiError> {
    let target = stager.resolve(&filename)?;
    let metadata = match fs::metadata(&target).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(ApiError::NotFound("file not found".into())),
    };

    let mime = mime_guess::from_path(&filename).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&metadata.len().to_string())
            .map_err(|_| ApiError::Internal("invalid header value".into()))?,
    );
    if let Ok(modified) = metadata.modified() {
        headers.insert(
            header::LAST_MODIFIED,
            HeaderValue::from_str(&fmt_http_date(modified))
                .map_err(|_| ApiError::Internal("invalid header value".into()))?,
        );
    }

    let file = File::open(&target).await?;
    let stream = ReaderStream::new(file);
    Ok((StatusCode::OK, headers, AxumBody::from_stream(stream)).into_response())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HealthResponse {
    status: &'static str,
    version: &'static str,
    media_count: usize,
}

/// Liveness probe with the current item count.
pub async fn health(
    Extension(store): Extension<Arc<MediaStore>>,
) -> JsonResponse<HealthResponse> {
    JsonResponse(HealthResponse {
        status: "ok",
        version: crate::build::PKG_VERSION,
        media_count: store.media_count().await,
    })
}
