use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
use serde_json::json;
use tokio::fs;

use super::types::*;
use crate::remote::{MediaStore, RemoteFile};

pub const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Thin client over the Gemini Files and generateContent endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
            base_url: GEMINI_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", HeaderValue::from_str(&self.api_key)?);
        Ok(headers)
    }

    pub(crate) async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);

        debug!("Gemini generateContent request (model {})", model);

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        Ok(check_status(response, "generateContent").await?.json().await?)
    }
}

async fn check_status(response: reqwest::Response, operation: &str) -> Result<reqwest::Response> {
    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await?;
        return Err(anyhow!("Gemini {} error ({}): {}", operation, status, error_text));
    }
    Ok(response)
}

#[async_trait]
impl MediaStore for GeminiClient {
    /// Uploads the file using the two-step resumable protocol.
    async fn upload_file(&self, path: &Path, mime_type: &str) -> Result<RemoteFile> {
        let file_bytes = fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let start = self
            .http
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .headers(self.headers()?)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", file_bytes.len())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check_status(start, "upload start").await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| anyhow!("Gemini upload start returned no upload URL"))?
            .to_string();

        debug!(
            "Uploading {} ({} bytes, {})",
            display_name,
            file_bytes.len(),
            mime_type
        );

        let finish = self
            .http
            .post(&upload_url)
            .header(CONTENT_LENGTH, file_bytes.len())
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(file_bytes)
            .send()
            .await?;

        let uploaded: UploadResponse = check_status(finish, "upload").await?.json().await?;
        debug!(
            "Uploaded {} as {} ({:?})",
            display_name, uploaded.file.name, uploaded.file.state
        );
        Ok(uploaded.file.into())
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile> {
        let response = self
            .http
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .headers(self.headers()?)
            .send()
            .await?;

        let file: FileResource = check_status(response, "files.get").await?.json().await?;
        Ok(file.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::FileState;
    use crate::test_support::serve;
    use actix_web::{web, HttpRequest, HttpResponse};
    use serde_json::Value;
    use std::io::Write;
    use std::sync::Mutex;

    type Requests = web::Data<Mutex<Vec<Value>>>;

    fn header(req: &HttpRequest, name: &str) -> Value {
        req.headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map_or(Value::Null, Value::from)
    }

    async fn upload_start(req: HttpRequest, body: web::Json<Value>, seen: Requests) -> HttpResponse {
        seen.lock().unwrap().push(json!({
            "api_key": header(&req, "x-goog-api-key"),
            "protocol": header(&req, "x-goog-upload-protocol"),
            "command": header(&req, "x-goog-upload-command"),
            "length": header(&req, "x-goog-upload-header-content-length"),
            "type": header(&req, "x-goog-upload-header-content-type"),
            "body": body.into_inner(),
        }));
        let session = format!("http://{}/upload/session/1", req.connection_info().host());
        HttpResponse::Ok()
            .insert_header(("x-goog-upload-url", session))
            .finish()
    }

    async fn upload_finalize(req: HttpRequest, body: web::Bytes, seen: Requests) -> HttpResponse {
        seen.lock().unwrap().push(json!({
            "command": header(&req, "x-goog-upload-command"),
            "offset": header(&req, "x-goog-upload-offset"),
            "length": header(&req, "content-length"),
            "body": String::from_utf8_lossy(&body),
        }));
        HttpResponse::Ok().json(json!({
            "file": {
                "name": "files/abc123",
                "uri": "https://example.invalid/v1beta/files/abc123",
                "mimeType": "video/quicktime",
                "sizeBytes": "11",
                "state": "PROCESSING"
            }
        }))
    }

    fn clip(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("video-")
            .suffix(".mov")
            .tempfile()
            .unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[actix_web::test]
    async fn resumable_upload_starts_then_finalizes() {
        let requests: Requests = web::Data::new(Mutex::new(Vec::new()));
        let shared = requests.clone();
        let base = serve(move |cfg| {
            cfg.app_data(shared.clone())
                .route("/upload/v1beta/files", web::post().to(upload_start))
                .route("/upload/session/1", web::post().to(upload_finalize));
        });
        let file = clip(b"video bytes");

        let uploaded = GeminiClient::new("secret-key")
            .with_base_url(&format!("{base}/"))
            .upload_file(file.path(), "video/quicktime")
            .await
            .unwrap();

        assert_eq!(uploaded.name, "files/abc123");
        assert_eq!(uploaded.mime_type, "video/quicktime");
        assert_eq!(uploaded.state, FileState::Processing);
        assert!(!uploaded.is_ready());

        let seen = requests.lock().unwrap();
        assert_eq!(seen.len(), 2);

        let start = &seen[0];
        assert_eq!(start["api_key"], "secret-key");
        assert_eq!(start["protocol"], "resumable");
        assert_eq!(start["command"], "start");
        assert_eq!(start["length"], "11");
        assert_eq!(start["type"], "video/quicktime");
        let display_name = file.path().file_name().unwrap().to_string_lossy();
        assert_eq!(start["body"]["file"]["display_name"], &*display_name);

        let finalize = &seen[1];
        assert_eq!(finalize["command"], "upload, finalize");
        assert_eq!(finalize["offset"], "0");
        assert_eq!(finalize["length"], "11");
        assert_eq!(finalize["body"], "video bytes");
    }

    async fn start_without_session() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[actix_web::test]
    async fn missing_upload_url_is_an_error() {
        let base = serve(|cfg| {
            cfg.route("/upload/v1beta/files", web::post().to(start_without_session));
        });
        let file = clip(b"x");

        let err = GeminiClient::new("k")
            .with_base_url(&base)
            .upload_file(file.path(), "video/mp4")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("no upload URL"), "{err}");
    }

    async fn quota_exceeded() -> HttpResponse {
        HttpResponse::TooManyRequests().body("quota exhausted")
    }

    #[actix_web::test]
    async fn rejected_upload_start_reports_status_and_body() {
        let base = serve(|cfg| {
            cfg.route("/upload/v1beta/files", web::post().to(quota_exceeded));
        });
        let file = clip(b"x");

        let err = GeminiClient::new("k")
            .with_base_url(&base)
            .upload_file(file.path(), "video/mp4")
            .await
            .unwrap_err()
            .to_string();

        assert!(err.contains("upload start"), "{err}");
        assert!(err.contains("429"), "{err}");
        assert!(err.contains("quota exhausted"), "{err}");
    }

    #[actix_web::test]
    async fn unreadable_local_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.mp4");

        let err = GeminiClient::new("k")
            .with_base_url("http://127.0.0.1:9")
            .upload_file(&missing, "video/mp4")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("gone.mp4"), "{err}");
    }

    async fn failed_file(req: HttpRequest) -> HttpResponse {
        assert_eq!(header(&req, "x-goog-api-key"), "k");
        HttpResponse::Ok().json(json!({
            "name": "files/bad",
            "uri": "https://example.invalid/v1beta/files/bad",
            "mimeType": "video/x-msvideo",
            "state": "FAILED",
            "error": { "code": 3, "message": "unsupported codec" },
            "expirationTime": "2026-10-21T12:00:00Z"
        }))
    }

    async fn active_file() -> HttpResponse {
        HttpResponse::Ok().json(json!({
            "name": "files/good",
            "uri": "https://example.invalid/v1beta/files/good",
            "mimeType": "video/mp4",
            "state": "ACTIVE"
        }))
    }

    async fn not_found() -> HttpResponse {
        HttpResponse::NotFound().body("no such file")
    }

    #[actix_web::test]
    async fn get_file_maps_state_and_error() {
        let base = serve(|cfg| {
            cfg.route("/v1beta/files/bad", web::get().to(failed_file))
                .route("/v1beta/files/good", web::get().to(active_file))
                .route("/v1beta/files/gone", web::get().to(not_found));
        });
        let client = GeminiClient::new("k").with_base_url(&base);

        let bad = client.get_file("files/bad").await.unwrap();
        assert_eq!(bad.state, FileState::Failed);
        assert_eq!(bad.error.as_deref(), Some("unsupported codec (code 3)"));
        assert!(bad.expiration_time.is_some());

        let good = client.get_file("files/good").await.unwrap();
        assert!(good.is_ready());
        assert_eq!(good.error, None);

        let err = client.get_file("files/gone").await.unwrap_err().to_string();
        assert!(err.contains("files.get"), "{err}");
        assert!(err.contains("404"), "{err}");
        assert!(err.contains("no such file"), "{err}");
    }
}
