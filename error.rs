use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures raised by the channel layer and the sensor drivers.
///
/// Nothing here is retried internally. Every variant carries the operation
/// (and register, where one is involved) so a log line is enough to locate
/// the fault.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to open {device}: {source}")]
    ChannelOpen {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("{context}: device accepted {written} of {expected} bytes")]
    ShortWrite {
        context: String,
        expected: usize,
        written: usize,
    },

    #[error("{context}: received {received} of {expected} bytes")]
    ShortRead {
        context: String,
        expected: usize,
        received: usize,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The CO2 response frame arrived complete but its trailing checksum
    /// byte disagrees with the payload. The decoded value is kept so the
    /// caller can decide whether to use it.
    #[error("CO2 frame checksum mismatch: expected {expected:#04x}, got {received:#04x} (concentration {concentration} ppm)")]
    ChecksumMismatch {
        concentration: u16,
        expected: u8,
        received: u8,
    },
}

impl Error {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Concentration carried by a checksum failure, if this is one.
    pub fn unverified_concentration(&self) -> Option<u16> {
        match self {
            Error::ChecksumMismatch { concentration, .. } => Some(*concentration),
            _ => None,
        }
    }
}

pub(crate) fn i2c_into_io(err: rppal::i2c::Error) -> io::Error {
    match err {
        rppal::i2c::Error::Io(e) => e,
        other => io::Error::other(other),
    }
}

pub(crate) fn uart_into_io(err: rppal::uart::Error) -> io::Error {
    match err {
        rppal::uart::Error::Io(e) => e,
        other => io::Error::other(other),
    }
}
