#![allow(dead_code)]

use controller::{
    AckPayload, AcquisitionError, BatchUploader, CaptureController, ControllerHandle, DraftStore,
    FileStore, FrameSource, PermissionStatus, Ports, SessionConfig, SubjectIdentity, UploadError,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
pub struct SourceProbe {
    pub calls: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl SourceProbe {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Frame source whose n-th call (0-based) takes `delay` and fails when
/// `fails(n)` is true.
pub struct ScriptedSource {
    pub probe: SourceProbe,
    pub delay: Duration,
    pub fails: fn(usize) -> bool,
}

impl ScriptedSource {
    pub fn new(delay: Duration, fails: fn(usize) -> bool) -> (Self, SourceProbe) {
        let probe = SourceProbe::default();
        (
            Self {
                probe: probe.clone(),
                delay,
                fails,
            },
            probe,
        )
    }
}

pub fn frame_path(n: usize) -> PathBuf {
    PathBuf::from(format!("/tmp/face_test/f_{n}.jpg"))
}

impl FrameSource for ScriptedSource {
    async fn acquire_frame(&mut self) -> Result<PathBuf, AcquisitionError> {
        let n = self.probe.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);
        if (self.fails)(n) {
            Err(AcquisitionError::Device(format!("frame {n} dropped")))
        } else {
            Ok(frame_path(n))
        }
    }
}

pub fn never_fails(_: usize) -> bool {
    false
}

pub fn always_fails(_: usize) -> bool {
    true
}

pub fn odd_fails(n: usize) -> bool {
    n % 2 == 1
}

#[derive(Clone, Default)]
pub struct UploadLog(pub Arc<Mutex<Vec<(Vec<PathBuf>, SubjectIdentity)>>>);

impl UploadLog {
    pub fn batches(&self) -> Vec<Vec<PathBuf>> {
        self.0.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }
}

pub struct FakeUploader {
    pub log: UploadLog,
    pub delay: Duration,
    pub response: Result<AckPayload, UploadError>,
}

impl FakeUploader {
    pub fn accepting() -> (Self, UploadLog) {
        Self::with(Ok(AckPayload {
            status: 200,
            body: serde_json::json!({ "registered": true }),
        }))
    }

    pub fn with(response: Result<AckPayload, UploadError>) -> (Self, UploadLog) {
        let log = UploadLog::default();
        (
            Self {
                log: log.clone(),
                delay: Duration::from_millis(250),
                response,
            },
            log,
        )
    }
}

impl BatchUploader for FakeUploader {
    fn endpoint(&self) -> &str {
        "https://recognition.test/register"
    }

    async fn submit(
        &self,
        paths: &[PathBuf],
        subject: &SubjectIdentity,
        _timeout: Duration,
    ) -> Result<AckPayload, UploadError> {
        self.log
            .0
            .lock()
            .unwrap()
            .push((paths.to_vec(), subject.clone()));
        tokio::time::sleep(self.delay).await;
        self.response.clone()
    }
}

#[derive(Clone, Default)]
pub struct DeleteLog(pub Arc<Mutex<Vec<PathBuf>>>);

impl DeleteLog {
    pub fn sorted(&self) -> Vec<PathBuf> {
        let mut deleted = self.0.lock().unwrap().clone();
        deleted.sort();
        deleted
    }
}

pub struct RecordingFiles(pub DeleteLog);

impl FileStore for RecordingFiles {
    async fn delete(&self, path: &Path) -> anyhow::Result<()> {
        self.0.0.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct DraftLog(pub Arc<Mutex<Vec<(String, Vec<(String, bool)>)>>>);

impl DraftLog {
    pub fn records(&self, key: &str) -> Vec<Vec<(String, bool)>> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, fields)| fields.clone())
            .collect()
    }
}

pub struct RecordingDrafts(pub DraftLog);

impl DraftStore for RecordingDrafts {
    async fn merge_record(&self, key: &str, fields: &[(&str, bool)]) -> anyhow::Result<()> {
        self.0.0.lock().unwrap().push((
            key.to_string(),
            fields.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        ));
        Ok(())
    }
}

pub fn outcome_fields(registered: bool) -> Vec<(String, bool)> {
    vec![
        ("videoRecorded".to_string(), true),
        ("registeredOnML".to_string(), registered),
    ]
}

pub struct Harness {
    pub handle: ControllerHandle,
    pub source: SourceProbe,
    pub uploads: UploadLog,
    pub deleted: DeleteLog,
    pub drafts: DraftLog,
}

pub async fn harness(
    config: SessionConfig,
    source: ScriptedSource,
    uploader: FakeUploader,
) -> Harness {
    let probe = source.probe.clone();
    let uploads = uploader.log.clone();
    let deleted = DeleteLog::default();
    let drafts = DraftLog::default();

    let handle = CaptureController::spawn(
        config,
        Ports {
            frame_source: source,
            uploader,
            file_store: RecordingFiles(deleted.clone()),
            draft_store: RecordingDrafts(drafts.clone()),
        },
    )
    .expect("valid config");

    handle.set_camera_ready(true).await;
    handle.set_permission(PermissionStatus::Granted).await;

    Harness {
        handle,
        source: probe,
        uploads,
        deleted,
        drafts,
    }
}
