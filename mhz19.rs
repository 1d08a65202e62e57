//! Winsen MH-Z19 NDIR CO2 sensor over UART.
//!
//! Every exchange is a 9-byte frame: start byte, then seven payload bytes
//! covered by the checksum, then the checksum itself.

use log::{trace, warn};

use crate::channel::{Channel, Transport};
use crate::error::{Error, Result};

pub const FRAME_LEN: usize = 9;

/// "Read CO2 concentration" (command 0x86 to sensor 0x01).
pub const READ_CONCENTRATION: [u8; FRAME_LEN] =
    [0xFF, 0x01, 0x86, 0x00, 0x00, 0x00, 0x00, 0x00, 0x79];

pub struct MhZ19<T> {
    channel: Channel<T>,
}

impl<T: Transport> MhZ19<T> {
    pub fn new(channel: Channel<T>) -> Self {
        MhZ19 { channel }
    }

    /// Requests the current concentration in ppm.
    ///
    /// If the response checksum does not match, the decoded value is still
    /// returned inside [`Error::ChecksumMismatch`].
    pub fn read(&mut self) -> Result<u16> {
        self.channel.write(&READ_CONCENTRATION)?;

        let mut frame = [0u8; FRAME_LEN];
        let mut sum = 0u8;
        let mut concentration = 0u16;
        for i in 0..FRAME_LEN {
            // One byte per call copes with ports that return short reads.
            let received = self.channel.read(&mut frame[i..i + 1])?;
            if received == 0 {
                return Err(Error::ShortRead {
                    context: format!("read CO2 frame from {}", self.channel.device()),
                    expected: FRAME_LEN,
                    received: i,
                });
            }

            let byte = frame[i];
            match i {
                0 | 8 => {}
                _ => sum = sum.wrapping_add(byte),
            }
            match i {
                2 => concentration = (byte as u16) << 8,
                3 => concentration |= byte as u16,
                _ => {}
            }
        }
        trace!("mhz19 response {:02x?}", frame);

        let expected = 0u8.wrapping_sub(sum);
        if frame[FRAME_LEN - 1] != expected {
            warn!(
                "mhz19 checksum mismatch on {}: {:02x?}",
                self.channel.device(),
                frame
            );
            return Err(Error::ChecksumMismatch {
                concentration,
                expected,
                received: frame[FRAME_LEN - 1],
            });
        }
        Ok(concentration)
    }

    pub fn close(self) -> Result<()> {
        self.channel.close()
    }
}
