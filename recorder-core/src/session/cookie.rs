use crate::models::error::RecorderError;
use crate::traits::audio_file::AudioFile;
use crate::traits::capture_queue::CaptureQueue;

/// What [`propagate_cookie`] found on the queue's encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieOutcome {
    /// The encoder has no cookie; nothing was written.
    Absent,
    /// A cookie of this many bytes was copied to the file.
    Copied(usize),
}

/// Copy the encoder's magic cookie from `queue` to `file`.
///
/// Called once before audio is written and again after capture stops, since
/// codecs may amend the cookie at the end of a session. A missing cookie, or a
/// size query that fails, is not an error.
pub fn propagate_cookie<Q, F>(queue: &Q, file: &mut F) -> Result<CookieOutcome, RecorderError>
where
    Q: CaptureQueue + ?Sized,
    F: AudioFile + ?Sized,
{
    let size = match queue.magic_cookie_size() {
        Ok(0) => return Ok(CookieOutcome::Absent),
        Ok(size) => size,
        Err(e) => {
            log::debug!("encoder reports no magic cookie: {}", e);
            return Ok(CookieOutcome::Absent);
        }
    };

    let mut cookie = vec![0u8; size];
    let copied = queue.copy_magic_cookie(&mut cookie)?;
    if copied == 0 {
        return Ok(CookieOutcome::Absent);
    }
    cookie.truncate(copied);

    file.set_magic_cookie(&cookie)?;
    log::debug!("copied {} byte magic cookie to {}", copied, file.path().display());
    Ok(CookieOutcome::Copied(copied))
}
