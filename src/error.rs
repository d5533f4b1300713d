use thiserror::Error;

/// Failure classes of a single HTTP GET.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server error: status {0}")]
    Server(u16),

    #[error("truncated download: expected {expected} bytes, got {received} bytes")]
    TruncatedDownload { expected: u64, received: u64 },
}

#[derive(Debug, Error)]
pub enum GrabError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("item page did not match the extraction patterns")]
    ExtractionFailure,

    #[error("image decode/encode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("jpeg encode error: {0}")]
    JpegEncode(#[from] jpeg_encoder::EncodingError),

    #[error("image {width}x{height} exceeds the jpeg size limit")]
    JpegTooLarge { width: u32, height: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("identifier {0} is already recorded in the ledger")]
    DuplicateIdentifier(u64),

    #[error("could not derive a file name from image url: {0}")]
    EmptyFilename(String),

    #[error("invalid seed url: {0}")]
    InvalidSeed(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, GrabError>;
