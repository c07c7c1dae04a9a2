//! Pipeline-level error taxonomy.
//!
//! Module errors ([`BackendError`], [`StorageError`], [`RecordError`],
//! [`QueueError`]) wrap into [`MediaError`] at the service boundary. Silent
//! no-ops (non-image media, missing source) are outcomes, not errors; see
//! [`GenerateOutcome`](crate::responsive::GenerateOutcome).

use crate::imaging::BackendError;
use crate::media::MediaId;
use crate::queue::QueueError;
use crate::records::RecordError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Conversion `{0}` is not registered")]
    ConversionNotFound(String),
    #[error("Disk `{0}` is not configured")]
    DiskMisconfigured(String),
    #[error("Disk `{disk}` is not writable: {source}")]
    DiskUnwritable {
        disk: String,
        #[source]
        source: StorageError,
    },
    #[error("Image encoding failed: {0}")]
    Encode(#[from] BackendError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Record store error: {0}")]
    Record(#[source] RecordError),
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    #[error("Media {0} not found")]
    MediaNotFound(MediaId),
    #[error("Invalid file name: {0:?}")]
    InvalidFileName(String),
}

impl MediaError {
    /// Whether running the same operation again could succeed.
    ///
    /// Unknown conversions, missing disks or media, bad names and
    /// unsupported encoders stay wrong however often they are retried.
    pub fn is_transient(&self) -> bool {
        match self {
            MediaError::Storage(e) | MediaError::DiskUnwritable { source: e, .. } => {
                !matches!(e, StorageError::InvalidPath(_))
            }
            MediaError::Encode(e) => !matches!(e, BackendError::UnsupportedFormat(_)),
            MediaError::Record(e) => matches!(e, RecordError::Io(_)),
            _ => false,
        }
    }
}

impl From<RecordError> for MediaError {
    fn from(error: RecordError) -> Self {
        match error {
            RecordError::NotFound(id) => MediaError::MediaNotFound(id),
            other => MediaError::Record(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ImageFormat;

    #[test]
    fn missing_record_is_media_not_found() {
        let error = MediaError::from(RecordError::NotFound(MediaId(4)));
        assert!(matches!(error, MediaError::MediaNotFound(MediaId(4))));
        assert_eq!(error.to_string(), "Media 4 not found");
    }

    #[test]
    fn transient_errors() {
        let io = || std::io::Error::other("busy");
        assert!(MediaError::Storage(StorageError::Io { path: "a".into(), source: io() }).is_transient());
        assert!(MediaError::Record(RecordError::Io(io())).is_transient());
        assert!(MediaError::Encode(BackendError::Decode("truncated".into())).is_transient());

        assert!(!MediaError::ConversionNotFound("nope".into()).is_transient());
        assert!(!MediaError::DiskMisconfigured("s3".into()).is_transient());
        assert!(!MediaError::MediaNotFound(MediaId(1)).is_transient());
        assert!(!MediaError::Encode(BackendError::UnsupportedFormat(ImageFormat::Heic)).is_transient());
        assert!(!MediaError::Storage(StorageError::InvalidPath("../x".into())).is_transient());
    }
}
