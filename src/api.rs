use std::sync::Arc;
use std::time::Instant;

use actix_multipart::Multipart;
use actix_web::{get, middleware, post, web, App, HttpResponse, HttpServer, Responder};
use bytes::{Bytes, BytesMut};
use futures::TryStreamExt;
use log::{debug, error, info};
use serde::Serialize;

use crate::agent::GeminiAgent;
use crate::analysis::{Analysis, Analyzer};
use crate::config::Config;
use crate::error::{AnalysisError, ErrorKind};
use crate::gemini::GeminiClient;
use crate::search::DuckDuckGo;
use crate::templates::{render_page, Notice, PageView};
use crate::upload::{validate_query, VideoUpload};

pub const AGENT_NAME: &str = "Video AI Summarizer";

/// Shared, read-only state handed to every request.
pub struct AppState {
    pub model: String,
    /// Shown on every page while the credential is missing.
    pub config_error: Option<String>,
    /// Only built when a credential is configured.
    pub analyzer: Option<Analyzer>,
}

impl AppState {
    pub fn from_config(config: &Config) -> Self {
        let Some(api_key) = config.api_key.as_deref() else {
            let err = AnalysisError::MissingCredential;
            error!("{}", err);
            return AppState {
                model: config.model.clone(),
                config_error: Some(err.to_string()),
                analyzer: None,
            };
        };

        let client = GeminiClient::new(api_key).with_base_url(&config.gemini_base_url);
        let agent = GeminiAgent::new(AGENT_NAME, client.clone(), &config.model)
            .tool(DuckDuckGo::new().with_base_url(&config.search_base_url))
            .markdown(true)
            .max_turns(config.agent_max_turns);
        info!("Initialized agent {:?} on {}", AGENT_NAME, agent.model());

        let analyzer = Analyzer::new(Arc::new(client), Arc::new(agent))
            .with_poll_policy(config.poll.clone())
            .with_staging_dir(config.staging_dir.clone());

        AppState {
            model: config.model.clone(),
            config_error: None,
            analyzer: Some(analyzer),
        }
    }

    async fn analyze(&self, form: AnalyzeForm) -> Result<Analysis, AnalysisError> {
        let (file_name, bytes) = form.video.ok_or(AnalysisError::MissingVideo)?;
        let upload = VideoUpload::new(file_name, bytes)?;

        match &self.analyzer {
            Some(analyzer) => analyzer.analyze(upload, &form.query).await,
            None => {
                validate_query(&form.query)?;
                Err(AnalysisError::MissingCredential)
            }
        }
    }
}

/// Fields posted by the upload form.
#[derive(Debug, Default)]
pub struct AnalyzeForm {
    /// File name and contents of the `video` field.
    pub video: Option<(String, Bytes)>,
    pub query: String,
}

async fn read_form(mut payload: Multipart) -> Result<AnalyzeForm, actix_web::Error> {
    let mut form = AnalyzeForm::default();

    while let Some(mut field) = payload.try_next().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let mut data = BytesMut::new();
        while let Some(chunk) = field.try_next().await? {
            data.extend_from_slice(&chunk);
        }

        match name.as_str() {
            // Browsers send an empty file part when nothing was chosen.
            "video" => {
                form.video = file_name
                    .filter(|f| !f.is_empty())
                    .map(|f| (f, data.freeze()));
            }
            "query" => form.query = String::from_utf8_lossy(&data).into_owned(),
            other => debug!("Ignoring form field {:?}", other),
        }
    }

    Ok(form)
}

fn notice_for(outcome: &Result<Analysis, AnalysisError>) -> Notice {
    match outcome {
        Ok(analysis) => Notice::Result {
            text: analysis.text.clone(),
            file_name: analysis.file_name.clone(),
            elapsed: analysis.elapsed,
        },
        Err(e) if e.kind() == ErrorKind::Validation => Notice::Warning(e.to_string()),
        Err(e) => Notice::Error(format!("An error occurred during analysis: {}", e)),
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub processing_time_ms: u64,
}

/// Render the upload page
///
/// # Example
/// ```shell
/// curl http://localhost:8080/
/// ```
#[get("/")]
pub async fn index(state: web::Data<AppState>) -> impl Responder {
    let html = render_page(&PageView {
        model: &state.model,
        config_error: state.config_error.as_deref(),
        ..Default::default()
    });
    HttpResponse::Ok().content_type("text/html; charset=utf-8").body(html)
}

/// Analyze a video and render the page with the outcome
#[post("/analyze")]
pub async fn analyze_page(
    state: web::Data<AppState>,
    payload: Multipart,
) -> actix_web::Result<HttpResponse> {
    let form = read_form(payload).await?;
    let query = form.query.clone();

    let outcome = state.analyze(form).await;
    let html = render_page(&PageView {
        model: &state.model,
        config_error: state.config_error.as_deref(),
        query: &query,
        notice: Some(notice_for(&outcome)),
    });

    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(html))
}

/// Analyze a video and return the outcome as JSON
///
/// # Example
/// ```shell
/// curl -X POST http://localhost:8080/api/analyze \
///   -F "video=@match.mp4" \
///   -F "query=Who scored and how?"
/// ```
///
/// # Returns
/// ```json
/// {
///   "status": "success",
///   "result": "## Summary ...",
///   "processing_time_ms": 18342
/// }
/// ```
#[post("/api/analyze")]
pub async fn analyze_api(
    state: web::Data<AppState>,
    payload: Multipart,
) -> actix_web::Result<HttpResponse> {
    let form = read_form(payload).await?;
    let start_time = Instant::now();

    let outcome = state.analyze(form).await;
    let processing_time_ms = start_time.elapsed().as_millis() as u64;

    let response = match notice_for(&outcome) {
        Notice::Result { text, .. } => ApiResponse {
            status: "success",
            result: Some(text),
            error: None,
            processing_time_ms,
        },
        Notice::Warning(msg) => ApiResponse {
            status: "warning",
            result: None,
            error: Some(msg),
            processing_time_ms,
        },
        Notice::Error(msg) => ApiResponse {
            status: "error",
            result: None,
            error: Some(msg),
            processing_time_ms,
        },
    };

    Ok(HttpResponse::Ok().json(response))
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "configured": state.analyzer.is_some(),
    }))
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(index)
        .service(analyze_page)
        .service(analyze_api)
        .service(health);
}

/// Run the API server
pub async fn run_api_server(state: AppState, bind_addr: &str, port: u16) -> std::io::Result<()> {
    let state = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .configure(routes)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
