//! Codec invoker: runs ffmpeg and ffprobe against staged files.
//!
//! There is exactly one output profile (HEVC/AAC in MP4). Inputs whose
//! extension is not a known video container are not transcoded at all.

mod config;
mod error;
mod ffmpeg;
mod profile;
mod traits;

pub use config::CodecConfig;
pub use error::CodecError;
pub use ffmpeg::FfmpegCodec;
pub use profile::{
    encode_args, is_transcodable, parse_duration_output, probe_args, VIDEO_EXTENSIONS,
};
pub use traits::{Codec, TranscodeOutput};
