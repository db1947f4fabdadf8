//! crates/sonicwave_core/src/synthesis.rs
//!
//! Audio generation as a submitted job: the caller gets a handle back at once,
//! and a background task synthesizes the text, uploads the artifact, and
//! records a `ProjectAudio` row. Completion is observed by awaiting the handle
//! or by polling the queue with the job id.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::domain::{NewProjectAudio, ProjectAudio};
use crate::ports::{
    AudioStorageService, DatabaseService, PortError, PortResult, TextToSpeechService,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed { audio: ProjectAudio },
    Failed { message: String },
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub project_id: Uuid,
    pub text: String,
    pub voice_id: String,
}

/// A submitted job. Dropping the handle does not cancel the job.
pub struct JobHandle {
    pub id: Uuid,
    rx: watch::Receiver<JobStatus>,
}

impl JobHandle {
    pub fn status(&self) -> JobStatus {
        self.rx.borrow().clone()
    }

    /// Waits for the job to finish and returns the recorded audio.
    pub async fn wait(&mut self) -> PortResult<ProjectAudio> {
        let status = self
            .rx
            .wait_for(JobStatus::is_terminal)
            .await
            .map(|s| s.clone())
            .map_err(|_| PortError::Unexpected("synthesis job ended without a result".to_string()))?;
        match status {
            JobStatus::Completed { audio } => Ok(audio),
            JobStatus::Failed { message } => Err(PortError::Unexpected(message)),
            JobStatus::Queued | JobStatus::Running => unreachable!("wait_for only yields terminal states"),
        }
    }
}

/// How long a finished job stays pollable.
pub const JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

struct JobEntry {
    rx: watch::Receiver<JobStatus>,
    finished_at: Option<Instant>,
}

/// Submits synthesis jobs and keeps their status around for polling.
///
/// Finished jobs are dropped from the registry once they are older than the
/// retention period; the sweep runs on every submit and poll.
#[derive(Clone)]
pub struct SynthesisQueue {
    tts: Arc<dyn TextToSpeechService>,
    storage: Arc<dyn AudioStorageService>,
    db: Arc<dyn DatabaseService>,
    jobs: Arc<Mutex<HashMap<Uuid, JobEntry>>>,
    retention: Duration,
}

impl SynthesisQueue {
    pub fn new(
        tts: Arc<dyn TextToSpeechService>,
        storage: Arc<dyn AudioStorageService>,
        db: Arc<dyn DatabaseService>,
    ) -> Self {
        Self {
            tts,
            storage,
            db,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            retention: JOB_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Locks the registry and evicts expired finished jobs.
    fn registry(&self) -> MutexGuard<'_, HashMap<Uuid, JobEntry>> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        let before = jobs.len();
        jobs.retain(|_, entry| match entry.finished_at {
            Some(at) => now.duration_since(at) < self.retention,
            None => true,
        });
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!("Evicted {} finished synthesis jobs", evicted);
        }
        jobs
    }

    fn mark_finished(&self, id: Uuid) {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = jobs.get_mut(&id) {
            entry.finished_at = Some(Instant::now());
        }
    }

    /// Spawns the job onto the current Tokio runtime.
    pub fn submit(&self, request: SynthesisRequest) -> JobHandle {
        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(JobStatus::Queued);
        self.registry().insert(
            id,
            JobEntry {
                rx: rx.clone(),
                finished_at: None,
            },
        );

        let queue = self.clone();
        tokio::spawn(async move {
            tx.send_replace(JobStatus::Running);
            let status = match queue.execute(id, &request).await {
                Ok(audio) => {
                    info!("Synthesis job {} finished: {}", id, audio.audio_url);
                    JobStatus::Completed { audio }
                }
                Err(e) => {
                    error!("Synthesis job {} for project {} failed: {}", id, request.project_id, e);
                    JobStatus::Failed {
                        message: e.message().to_string(),
                    }
                }
            };
            queue.mark_finished(id);
            tx.send_replace(status);
        });

        info!("Submitted synthesis job {}", id);
        JobHandle { id, rx }
    }

    pub fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.registry()
            .get(&id)
            .map(|entry| entry.rx.borrow().clone())
    }

    async fn execute(&self, audio_id: Uuid, request: &SynthesisRequest) -> PortResult<ProjectAudio> {
        let bytes = self
            .tts
            .generate_audio(&request.text, &request.voice_id)
            .await?;

        let path = format!("{}/{}.mp3", request.project_id, audio_id);
        let audio_url = self.storage.store_audio(&path, bytes).await?;

        self.db
            .create_project_audio(NewProjectAudio {
                id: audio_id,
                project_id: request.project_id,
                voice_id: request.voice_id.clone(),
                audio_url,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeSpeech, InMemoryBackend, Op};

    fn queue(backend: &InMemoryBackend, speech: &FakeSpeech) -> SynthesisQueue {
        SynthesisQueue::new(
            Arc::new(speech.clone()),
            Arc::new(backend.clone()),
            Arc::new(backend.clone()),
        )
    }

    #[tokio::test]
    async fn completed_job_records_audio() {
        let backend = InMemoryBackend::new();
        let speech = FakeSpeech::new();
        let queue = queue(&backend, &speech);
        let project_id = Uuid::new_v4();

        let mut handle = queue.submit(SynthesisRequest {
            project_id,
            text: "Hello there".into(),
            voice_id: "en-GB-2".into(),
        });
        let audio = handle.wait().await.unwrap();

        assert_eq!(audio.project_id, project_id);
        assert_eq!(audio.voice_id, "en-GB-2");
        assert_eq!(backend.audio_rows(), vec![audio.clone()]);
        let path = format!("{}/{}.mp3", project_id, handle.id);
        assert_eq!(backend.stored_object(&path), Some(b"en-GB-2:Hello there".to_vec()));
        assert!(matches!(queue.status(handle.id), Some(JobStatus::Completed { .. })));
    }

    #[tokio::test]
    async fn synthesis_failure_is_reported_and_nothing_is_recorded() {
        let backend = InMemoryBackend::new();
        let speech = FakeSpeech::new();
        speech.fail_next(PortError::Unexpected("quota exceeded".into()));
        let queue = queue(&backend, &speech);

        let mut handle = queue.submit(SynthesisRequest {
            project_id: Uuid::new_v4(),
            text: "Hello".into(),
            voice_id: "en-US-1".into(),
        });
        let err = handle.wait().await.unwrap_err();

        assert_eq!(err.message(), "quota exceeded");
        assert_eq!(backend.calls(Op::StoreAudio), 0);
        assert!(backend.audio_rows().is_empty());
        assert_eq!(
            queue.status(handle.id),
            Some(JobStatus::Failed {
                message: "quota exceeded".into()
            })
        );
    }

    #[tokio::test]
    async fn finished_jobs_are_evicted_after_the_retention_period() {
        let backend = InMemoryBackend::new();
        let speech = FakeSpeech::new();
        let queue = queue(&backend, &speech).with_retention(Duration::from_millis(250));

        let mut handle = queue.submit(SynthesisRequest {
            project_id: Uuid::new_v4(),
            text: "Short lived".into(),
            voice_id: "en-US-1".into(),
        });
        handle.wait().await.unwrap();
        assert!(queue.status(handle.id).is_some());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(queue.status(handle.id).is_none());
        // The recorded audio outlives the job entry.
        assert_eq!(backend.audio_rows().len(), 1);
    }

    #[tokio::test]
    async fn unknown_job_has_no_status() {
        let backend = InMemoryBackend::new();
        let queue = queue(&backend, &FakeSpeech::new());
        assert!(queue.status(Uuid::new_v4()).is_none());
    }
}
