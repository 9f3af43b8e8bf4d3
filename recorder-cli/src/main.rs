//! Records the default input device to `output.caf` until <return> is pressed.
//!
//! Takes no arguments. Set `RUST_LOG=debug` for buffer and cookie detail.

use std::io;
use std::process::ExitCode;

use recorder_core::{CafFileService, CaptureBackend, FormatId, Recorder, RecorderConfiguration};

#[cfg(target_os = "macos")]
fn platform() -> (recorder_coreaudio::CoreAudioBackend, FormatId) {
    (recorder_coreaudio::CoreAudioBackend::new(), FormatId::MPEG4_AAC)
}

/// No AAC encoder off macOS; record linear PCM.
#[cfg(not(target_os = "macos"))]
fn platform() -> (recorder_cpal::CpalBackend, FormatId) {
    (recorder_cpal::CpalBackend::new(), FormatId::LINEAR_PCM)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (backend, format_id) = platform();
    let config = RecorderConfiguration {
        format_id,
        ..Default::default()
    };
    record(backend, config)
}

fn record<B: CaptureBackend>(backend: B, config: RecorderConfiguration) -> ExitCode {
    let mut recorder = Recorder::new(backend, CafFileService, config);
    if let Err(e) = recorder.start() {
        eprintln!("recorder: {}", e);
        return ExitCode::FAILURE;
    }

    println!("Recording, press <return> to stop:");
    wait_for_return();
    println!("* recording done *");

    // Past this point the file already holds audio; teardown problems are
    // reported but do not change the exit status.
    if let Err(e) = recorder.stop() {
        log::error!("failed to stop recording: {}", e);
    }
    match recorder.dispose() {
        Ok(result) => log::info!(
            "{}: {} packets, {:.2} s",
            result.file_path.display(),
            result.packets_written,
            result.duration_secs
        ),
        Err(e) => log::error!("failed to finish recording: {}", e),
    }
    ExitCode::SUCCESS
}

/// Block until a line (or end of input) arrives on stdin.
fn wait_for_return() {
    let mut line = String::new();
    if let Err(e) = io::stdin().read_line(&mut line) {
        log::warn!("failed to read stdin: {}", e);
    }
}
