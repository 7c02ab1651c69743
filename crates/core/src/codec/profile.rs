//! The fixed transcoding profile and the rules for which inputs it applies to.

use std::path::Path;

/// Container extensions that are transcoded. Anything else is kept as uploaded.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg", "3gp",
];

/// Extension of the last key segment: everything after its final '.'.
///
/// Unlike `Path::extension`, a leading-dot name such as `.mov` counts as
/// having the extension `mov`.
fn key_extension(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next().unwrap_or(key);
    name.rfind('.').map(|i| &name[i + 1..])
}

/// Whether an object key (or file name) names a video container we transcode.
pub fn is_transcodable(key: &str) -> bool {
    key_extension(key)
        .map(|ext| {
            VIDEO_EXTENSIONS
                .iter()
                .any(|v| v.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// ffmpeg arguments for the single supported profile: HEVC at CRF 28 with the
/// `fast` preset, tagged `hvc1`, AAC audio, moov atom up front, overwrite output.
pub fn encode_args(input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "libx265".to_string(),
        "-crf".to_string(),
        "28".to_string(),
        "-preset".to_string(),
        "fast".to_string(),
        "-tag:v".to_string(),
        "hvc1".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-y".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// ffprobe arguments that print only the container duration in seconds.
pub fn probe_args(path: &Path) -> Vec<String> {
    vec![
        "-v".to_string(),
        "error".to_string(),
        "-show_entries".to_string(),
        "format=duration".to_string(),
        "-of".to_string(),
        "default=noprint_wrappers=1:nokey=1".to_string(),
        path.to_string_lossy().to_string(),
    ]
}

/// Parse ffprobe's duration output. Anything but a single finite,
/// non-negative number is treated as unknown.
pub fn parse_duration_output(output: &str) -> Option<f64> {
    output
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
}
