//! Embedded gallery page and on-disk logo assets.

use axum::body::Body as AxumBody;
use axum::extract::Extension;
use axum::http::{HeaderMap, HeaderValue, Request, Uri, header};
use axum::response::{IntoResponse, Response};
use rust_embed::RustEmbed;
use std::io;
use std::path::PathBuf;
use tokio::fs;

use crate::error::ApiError;

/// Embedded gallery page assets.
#[derive(RustEmbed)]
#[folder = "frontend"]
pub struct FrontendAssets;

/// Directory holding deployment-provided assets (the logo files).
#[derive(Clone, Debug)]
pub struct AssetsDir(pub PathBuf);

/// Fallback handler serving the embedded gallery page. Unknown API routes
/// never fall back to the page.
pub async fn serve_frontend(req: Request<AxumBody>) -> Result<Response, ApiError> {
    let path = req.uri().path().trim_start_matches('/');
    if path.starts_with("api/") {
        return Err(ApiError::NotFound("not found".into()));
    }
    let requested = if path.is_empty() { "index.html" } else { path };
    if let Some(response) = load_embedded_asset(requested)? {
        return Ok(response);
    }

    if !requested.contains('.')
        && let Some(response) = load_embedded_asset("index.html")?
    {
        return Ok(response);
    }

    Err(ApiError::NotFound("not found".into()))
}

fn load_embedded_asset(path: &str) -> Result<Option<Response>, ApiError> {
    let Some(asset) = FrontendAssets::get(path) else {
        return Ok(None);
    };
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(mime.essence_str())
            .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
    );
    Ok(Some(
        (headers, AxumBody::from(asset.data.into_owned())).into_response(),
    ))
}

/// Serves `/logo.png` or `/logo.jpg` from the assets directory, falling back
/// to whichever of the two files actually exists.
pub async fn serve_logo(
    uri: Uri,
    Extension(AssetsDir(assets_dir)): Extension<AssetsDir>,
) -> Result<Response, ApiError> {
    let requested = uri.path().trim_start_matches('/');
    let fallback = if requested == "logo.png" {
        "logo.jpg"
    } else {
        "logo.png"
    };

    for name in [requested, fallback] {
        match fs::read(assets_dir.join(name)).await {
            Ok(bytes) => {
                let mime = mime_guess::from_path(name).first_or_octet_stream();
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_str(mime.essence_str())
                        .map_err(|_| ApiError::Internal("invalid mime type".into()))?,
                );
                return Ok((headers, AxumBody::from(bytes)).into_response());
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(ApiError::NotFound("logo not found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use tempfile::tempdir;

    #[tokio::test]
    async fn logo_request_falls_back_to_other_extension() {
        let temp = tempdir().expect("tempdir");
        std::fs::write(temp.path().join("logo.jpg"), b"jpg-bytes").expect("write logo");
        let assets = AssetsDir(temp.path().to_path_buf());

        let response = serve_logo(Uri::from_static("/logo.png"), Extension(assets))
            .await
            .expect("serve logo")
            .into_response();
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("image/jpeg")
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(bytes.as_ref(), b"jpg-bytes");
    }

    #[tokio::test]
    async fn root_serves_embedded_gallery_page() {
        let request = Request::builder()
            .uri("/")
            .body(AxumBody::empty())
            .expect("request");
        let response = serve_frontend(request).await.expect("serve page");
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            HeaderValue::from_static("text/html")
        );
    }

    #[tokio::test]
    async fn unknown_api_route_does_not_fall_back_to_page() {
        let request = Request::builder()
            .uri("/api/does-not-exist")
            .body(AxumBody::empty())
            .expect("request");
        let result = serve_frontend(request).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_logos_are_not_found() {
        let temp = tempdir().expect("tempdir");
        let assets = AssetsDir(temp.path().to_path_buf());
        let result = serve_logo(Uri::from_static("/logo.jpg"), Extension(assets)).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }
}
