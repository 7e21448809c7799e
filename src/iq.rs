//! Conversions between raw IQ byte streams and complex samples.
//!
//! `cu8` is the interleaved unsigned 8-bit format spoken by rtl_sdr and
//! rtl_tcp: `128` is zero and `127` counts are full scale. `cf32` is
//! interleaved little-endian `f32`.

use std::str::FromStr;

use num_complex::Complex;

use crate::error::Error;
use crate::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IqFormat {
    Cu8,
    Cf32,
}

impl IqFormat {
    /// Bytes per complex sample
    pub fn sample_size(self) -> usize {
        match self {
            IqFormat::Cu8 => 2,
            IqFormat::Cf32 => 8,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            IqFormat::Cu8 => "cu8",
            IqFormat::Cf32 => "cf32",
        }
    }

    /// Decode whole samples from `bytes` into `out`, ignoring a trailing partial sample
    pub fn unpack(self, bytes: &[u8], out: &mut Vec<Sample>) {
        match self {
            IqFormat::Cu8 => unpack_cu8(bytes, out),
            IqFormat::Cf32 => unpack_cf32(bytes, out),
        }
    }

    pub fn pack(self, samples: &[Sample], out: &mut Vec<u8>) {
        match self {
            IqFormat::Cu8 => pack_cu8(samples, out),
            IqFormat::Cf32 => pack_cf32(samples, out),
        }
    }
}

impl FromStr for IqFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cu8" | "u8" => Ok(IqFormat::Cu8),
            "cf32" | "f32" | "cfile" => Ok(IqFormat::Cf32),
            other => Err(Error::config(format!("unknown IQ format '{}'", other))),
        }
    }
}

pub fn unpack_cu8(bytes: &[u8], out: &mut Vec<Sample>) {
    out.clear();
    out.extend(bytes.chunks_exact(2).map(|iq| {
        Complex::new(
            (iq[0] as f32 - 128.0) / 127.0,
            (iq[1] as f32 - 128.0) / 127.0,
        )
    }));
}

#[inline]
fn to_u8(x: f32) -> u8 {
    (128.0 + x * 127.0).clamp(0.0, 255.0) as u8
}

pub fn pack_cu8(samples: &[Sample], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * 2);
    for s in samples {
        out.push(to_u8(s.re));
        out.push(to_u8(s.im));
    }
}

pub fn unpack_cf32(bytes: &[u8], out: &mut Vec<Sample>) {
    out.clear();
    out.extend(bytes.chunks_exact(8).map(|iq| {
        let re = f32::from_le_bytes([iq[0], iq[1], iq[2], iq[3]]);
        let im = f32::from_le_bytes([iq[4], iq[5], iq[6], iq[7]]);
        Complex::new(re, im)
    }));
}

pub fn pack_cf32(samples: &[Sample], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * 8);
    for s in samples {
        out.extend_from_slice(&s.re.to_le_bytes());
        out.extend_from_slice(&s.im.to_le_bytes());
    }
}
