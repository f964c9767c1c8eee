use opentelemetry::{
    KeyValue, global,
    metrics::{Counter, Histogram},
};
use std::time::Duration;

#[derive(Clone)]
pub struct SessionMetrics {
    frames: Counter<u64>,
    frames_dropped: Counter<u64>,
    sessions: Counter<u64>,
    upload_duration: Histogram<f64>,
}

impl SessionMetrics {
    pub fn new(meter_name: &'static str) -> Self {
        let meter = global::meter(meter_name);
        let upload_buckets = [0.25, 0.5, 1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 180.0];

        Self {
            frames: meter
                .u64_counter("capture_frames_total")
                .with_description("Frames appended to a capture batch")
                .build(),
            frames_dropped: meter
                .u64_counter("capture_frames_dropped_total")
                .with_description("Acquisition attempts that produced no frame")
                .build(),
            sessions: meter
                .u64_counter("capture_sessions_total")
                .with_description("Finalized capture sessions by outcome")
                .build(),
            upload_duration: meter
                .f64_histogram("capture_upload_duration_seconds")
                .with_description("Time to submit one batch to the recognition service")
                .with_unit("s")
                .with_boundaries(upload_buckets.to_vec())
                .build(),
        }
    }

    pub fn frame_captured(&self) {
        self.frames.add(1, &[]);
    }

    pub fn frame_dropped(&self) {
        self.frames_dropped.add(1, &[]);
    }

    pub fn session_finished(&self, outcome: &'static str) {
        self.sessions.add(1, &[KeyValue::new("outcome", outcome)]);
    }

    pub fn upload_finished(&self, elapsed: Duration, success: bool) {
        self.upload_duration.record(
            elapsed.as_secs_f64(),
            &[KeyValue::new("success", success)],
        );
    }
}
