//! Media item types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// User-visible lifecycle status of a media item.
///
/// `uploading` and `queued` are written by the upload collaborator; everything
/// after that is driven by the processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    Uploading,
    Queued,
    Processing,
    Ready,
    Failed,
}

impl MediaStatus {
    /// Stable string form, as stored in the `status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }

    /// Whether a worker may claim an item in this status for processing.
    ///
    /// `failed` stays claimable so that a redelivered event retries the item.
    pub fn is_claimable(&self) -> bool {
        !matches!(self, Self::Processing | Self::Ready)
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploading" => Ok(Self::Uploading),
            "queued" => Ok(Self::Queued),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown media status: {}", other)),
        }
    }
}

/// A media item as seen by the processing pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub owner_id: i64,
    /// Key of the file uploaded by the client, `original/<owner>/<id>/<filename>`.
    pub original_storage_key: String,
    /// Key of the transcoded artifact. Only set once the item is ready and was a video.
    pub processed_storage_key: Option<String>,
    pub size_bytes: i64,
    pub duration_seconds: i64,
    pub status: MediaStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of an attempt to claim a media item for processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The status was moved to `processing`; `previous` is what it was before.
    Claimed { previous: MediaStatus },
    /// Another delivery already claimed or finished the item.
    AlreadyClaimed { current: MediaStatus },
}

impl ClaimOutcome {
    pub fn is_claimed(&self) -> bool {
        matches!(self, Self::Claimed { .. })
    }
}
