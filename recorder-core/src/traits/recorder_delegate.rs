use crate::models::error::RecorderError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::EngineState;

/// Event delegate for recorder notifications.
///
/// Methods run on the thread that caused the event: state changes and the
/// finished recording on the orchestrating thread, write failures on the
/// capture thread.
pub trait RecorderDelegate: Send + Sync {
    fn on_state_changed(&self, state: EngineState);

    /// A packet write failed. Capture continues; repeated failures are the
    /// delegate's cue to stop the recorder.
    fn on_packet_write_failed(&self, error: &RecorderError, packet_count: u32, cursor: i64);

    fn on_recording_finished(&self, result: &RecordingResult);
}
