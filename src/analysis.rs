use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::agent::Agent;
use crate::error::AnalysisError;
use crate::poller::{wait_until_ready, PollPolicy};
use crate::remote::MediaStore;
use crate::staging::StagedVideo;
use crate::upload::{validate_query, VideoUpload};

/// Steps of a single analysis attempt, logged as the attempt advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Idle,
    Staged,
    Uploading,
    Polling,
    Ready,
    Completed,
    Failed,
    Cleaned,
}

#[derive(Debug, Clone)]
pub struct Analysis {
    /// Agent answer, unmodified.
    pub text: String,
    pub file_name: String,
    pub elapsed: Duration,
}

pub fn build_prompt(query: &str) -> String {
    format!(
        "Analyze the uploaded video for content and context.\n\
         Respond to the following query using video insights and supplementary web research:\n\
         {query}\n\
         \n\
         Provide a detailed, user-friendly, and actionable response."
    )
}

/// Runs the stage → upload → poll → agent pipeline for one request.
///
/// Holds the agent built once at startup; handlers share it through `Arc`.
pub struct Analyzer {
    store: Arc<dyn MediaStore>,
    agent: Arc<dyn Agent>,
    poll: PollPolicy,
    staging_dir: PathBuf,
}

impl Analyzer {
    pub fn new(store: Arc<dyn MediaStore>, agent: Arc<dyn Agent>) -> Self {
        Self {
            store,
            agent,
            poll: PollPolicy::default(),
            staging_dir: std::env::temp_dir(),
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    pub async fn analyze(
        &self,
        upload: VideoUpload,
        query: &str,
    ) -> Result<Analysis, AnalysisError> {
        let query = validate_query(query)?;
        let started = Instant::now();
        let mut state = AttemptState::Idle;

        let staged = StagedVideo::stage(&self.staging_dir, &upload).await?;
        transition(&mut state, AttemptState::Staged);

        let outcome = self.run_remote(&staged, query, &mut state).await;
        match &outcome {
            Ok(_) => transition(&mut state, AttemptState::Completed),
            Err(e) => {
                error!("Analysis of {} failed: {}", upload.file_name, e);
                transition(&mut state, AttemptState::Failed);
            }
        }

        if let Err(e) = staged.cleanup() {
            warn!("Failed to remove staged video: {}", e);
        }
        transition(&mut state, AttemptState::Cleaned);

        let text = outcome?;
        let elapsed = started.elapsed();
        info!(
            "Analyzed {} in {:?} ({} chars)",
            upload.file_name,
            elapsed,
            text.len()
        );

        Ok(Analysis {
            text,
            file_name: upload.file_name,
            elapsed,
        })
    }

    async fn run_remote(
        &self,
        staged: &StagedVideo,
        query: &str,
        state: &mut AttemptState,
    ) -> Result<String, AnalysisError> {
        transition(state, AttemptState::Uploading);
        let handle = self
            .store
            .upload_file(staged.path(), staged.format().mime_type())
            .await
            .map_err(AnalysisError::Upload)?;

        transition(state, AttemptState::Polling);
        let ready = wait_until_ready(self.store.as_ref(), handle, &self.poll).await?;
        transition(state, AttemptState::Ready);

        let prompt = build_prompt(query);
        self.agent
            .run(&prompt, std::slice::from_ref(&ready))
            .await
            .map_err(AnalysisError::Agent)
    }
}

fn transition(state: &mut AttemptState, next: AttemptState) {
    debug!("Analysis attempt {:?} -> {:?}", state, next);
    *state = next;
}
