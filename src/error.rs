use crate::dims::BlockIndex;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error raised by an external collaborator (source reader or destination writer).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Every error is fatal to the conversion run which raised it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("source header could not be read: {0}")]
    Header(#[source] BoxError),
    #[error("region for block {block} could not be read: {source}")]
    Read {
        block: BlockIndex,
        #[source]
        source: BoxError,
    },
    #[error("destination writer could not be opened: {0}")]
    WriterOpen(#[source] BoxError),
    #[error("block {block} could not be copied to the destination: {source}")]
    Copy {
        block: BlockIndex,
        #[source]
        source: BoxError,
    },
    #[error("destination could not be finalized: {0}")]
    Finalize(#[source] BoxError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    General(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn header(error: impl Into<BoxError>) -> Self {
        Self::Header(error.into())
    }

    pub fn read(block: BlockIndex, error: impl Into<BoxError>) -> Self {
        Self::Read {
            block,
            source: error.into(),
        }
    }

    pub fn writer_open(error: impl Into<BoxError>) -> Self {
        Self::WriterOpen(error.into())
    }

    pub fn copy(block: BlockIndex, error: impl Into<BoxError>) -> Self {
        Self::Copy {
            block,
            source: error.into(),
        }
    }

    pub fn finalize(error: impl Into<BoxError>) -> Self {
        Self::Finalize(error.into())
    }

    /// The block being processed when the error was raised, if any.
    pub fn block(&self) -> Option<BlockIndex> {
        match self {
            Self::Read { block, .. } | Self::Copy { block, .. } => Some(*block),
            _ => None,
        }
    }
}
