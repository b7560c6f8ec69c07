/// Minimum allowance for any transcription, in minutes.
const FLOOR_MINUTES: f64 = 10.0;
/// A job claiming more than this is treated as hung.
const CEILING_MINUTES: f64 = 120.0;
/// Rough density of speech audio: about 2 MB per minute.
const MB_PER_MINUTE: f64 = 2.0;

/// Execution deadline for a transcription stage, in seconds.
///
/// Estimates the audio duration from the file size, scales it by the
/// engine's relative slowness, then clamps to [10, 120] minutes. Pure and
/// deterministic: the same inputs always produce the same deadline.
pub fn compute_timeout_secs(file_size_mb: f64, engine_multiplier: f64) -> u64 {
    let estimated_minutes = (file_size_mb / MB_PER_MINUTE).max(1.0);
    let transcription_minutes = (estimated_minutes * engine_multiplier).max(FLOOR_MINUTES);
    (transcription_minutes * 60.0).min(CEILING_MINUTES * 60.0) as u64
}
