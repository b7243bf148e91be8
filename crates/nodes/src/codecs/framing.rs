// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wire format shared by the framing encoder and the reorder decoder.
//!
//! Every access unit is `[u32 big-endian payload length][payload]`. The stream starts with a
//! codec-config unit holding [`CONFIG_MAGIC`].

use codeckit_core::error::{CodecError, Result};

/// Codec-specific data sent ahead of the first access unit.
pub const CONFIG_MAGIC: &[u8; 4] = b"CKF\x01";

/// Length prefix size in bytes.
pub const HEADER_LEN: usize = 4;

/// Size of the framed unit for a payload of `payload_len` bytes.
pub const fn framed_len(payload_len: usize) -> usize {
    HEADER_LEN + payload_len
}

/// Writes the header and payload into `out`, which must hold `framed_len(payload.len())` bytes.
///
/// # Errors
///
/// Returns [`CodecError::BadValue`] if the payload does not fit the header or `out` is short.
pub fn write_frame(payload: &[u8], out: &mut [u8]) -> Result<usize> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CodecError::BadValue(format!("payload of {} bytes too large", payload.len())))?;
    let total = framed_len(payload.len());
    let available = out.len();
    let Some(out) = out.get_mut(..total) else {
        return Err(CodecError::BadValue(format!(
            "output block holds {available} bytes, frame needs {total}"
        )));
    };
    out[..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    out[HEADER_LEN..].copy_from_slice(payload);
    Ok(total)
}

/// Returns the payload of a framed unit.
///
/// # Errors
///
/// Returns [`CodecError::Corrupted`] for a truncated header or a length mismatch.
pub fn parse_frame(frame: &[u8]) -> Result<&[u8]> {
    let Some((header, payload)) = frame.split_first_chunk::<HEADER_LEN>() else {
        return Err(CodecError::Corrupted(format!("truncated frame header ({} bytes)", frame.len())));
    };
    let declared = u32::from_be_bytes(*header) as usize;
    if declared != payload.len() {
        return Err(CodecError::Corrupted(format!(
            "frame declares {declared} payload bytes but carries {}",
            payload.len()
        )));
    }
    Ok(payload)
}

/// Checks a codec-config unit.
///
/// # Errors
///
/// Returns [`CodecError::Corrupted`] if the unit is not a known config.
pub fn check_config(data: &[u8]) -> Result<()> {
    if data == CONFIG_MAGIC {
        Ok(())
    } else {
        Err(CodecError::Corrupted(format!("unrecognized codec config ({} bytes)", data.len())))
    }
}
