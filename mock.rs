//! In-memory transports for exercising the drivers without hardware.

use std::collections::VecDeque;
use std::io;

use crate::channel::Transport;

/// Calibration blocks of the datasheet's worked example.
pub const CALIB00: [u8; 26] = [
    0x70, 0x6B, // T1 27504
    0x43, 0x67, // T2 26435
    0x18, 0xFC, // T3 -1000
    0x7D, 0x8E, // P1 36477
    0x43, 0xD6, // P2 -10685
    0xD0, 0x0B, // P3 3024
    0x27, 0x0B, // P4 2855
    0x8C, 0x00, // P5 140
    0xF9, 0xFF, // P6 -7
    0x8C, 0x3C, // P7 15500
    0xF8, 0xC6, // P8 -14600
    0x70, 0x17, // P9 6000
    0x00, // reserved (0xA0)
    0x4B, // H1 75
];

pub const CALIB26: [u8; 7] = [
    0x72, 0x01, // H2 370
    0x00, // H3 0
    0x13, 0x09, 0x32, // H4 313, H5 50
    0x1E, // H6 30
];

/// Emulates an I2C peripheral's register file.
///
/// The first byte of every write moves the register pointer, any further
/// bytes are stored from there on. Reads return bytes from the pointer and
/// auto-increment, like the BME280 does.
pub struct RegisterFile {
    registers: [u8; 256],
    pointer: u8,
    writes: Vec<Vec<u8>>,
    short_read: Option<usize>,
    fail_after_writes: Option<usize>,
}

impl RegisterFile {
    pub fn new() -> Self {
        RegisterFile {
            registers: [0; 256],
            pointer: 0,
            writes: Vec::new(),
            short_read: None,
            fail_after_writes: None,
        }
    }

    pub fn load(&mut self, start: u8, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.registers[start as usize + i] = *b;
        }
    }

    pub fn register(&self, reg: u8) -> u8 {
        self.registers[reg as usize]
    }

    /// Every write transaction seen so far, register byte included.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Caps every read at `n` bytes.
    pub fn truncate_reads(mut self, n: usize) -> Self {
        self.short_read = Some(n);
        self
    }

    /// Fails every write once `n` writes have succeeded.
    pub fn fail_after_writes(mut self, n: usize) -> Self {
        self.fail_after_writes = Some(n);
        self
    }
}

impl Transport for RegisterFile {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some(limit) = self.fail_after_writes {
            if self.writes.len() >= limit {
                return Err(io::Error::new(io::ErrorKind::Other, "bus fault"));
            }
        }
        self.writes.push(buf.to_vec());
        if let Some((&reg, data)) = buf.split_first() {
            self.pointer = reg;
            for b in data {
                self.registers[self.pointer as usize] = *b;
                self.pointer = self.pointer.wrapping_add(1);
            }
        }
        Ok(buf.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.short_read.map_or(buf.len(), |cap| cap.min(buf.len()));
        for slot in buf.iter_mut().take(n) {
            *slot = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
        Ok(n)
    }
}

/// Emulates a serial port that replies with a fixed byte script.
///
/// Once the script runs dry reads return 0 bytes.
pub struct ScriptedPort {
    incoming: VecDeque<u8>,
    written: Vec<u8>,
    accept_limit: Option<usize>,
    fail_reads: bool,
}

impl ScriptedPort {
    pub fn new(response: &[u8]) -> Self {
        ScriptedPort {
            incoming: response.iter().copied().collect(),
            written: Vec::new(),
            accept_limit: None,
            fail_reads: false,
        }
    }

    /// Accepts no more than `n` bytes per write call.
    pub fn accept_at_most(mut self, n: usize) -> Self {
        self.accept_limit = Some(n);
        self
    }

    pub fn fail_reads(mut self) -> Self {
        self.fail_reads = true;
        self
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn remaining(&self) -> usize {
        self.incoming.len()
    }
}

impl Transport for ScriptedPort {
    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.accept_limit.map_or(buf.len(), |cap| cap.min(buf.len()));
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_reads {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "line dropped"));
        }
        let mut n = 0;
        while n < buf.len() {
            match self.incoming.pop_front() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        Ok(n)
    }
}
