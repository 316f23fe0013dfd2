// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Limits on image values stored in portfolios.
//!
//! Images arrive either as ordinary URLs or embedded as base64 `data:` URLs
//! straight from the browser's file reader.

use crate::error::AppError;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Longest accepted non-embedded image URL.
pub const MAX_IMAGE_URL_LEN: usize = 2048;

/// Validate one image value against the embedded payload limit.
pub fn check_image_url(url: &str, max_bytes: usize) -> Result<(), AppError> {
    let Some(rest) = url.strip_prefix("data:") else {
        if url.len() > MAX_IMAGE_URL_LEN {
            return Err(AppError::Validation(format!(
                "Image URL exceeds {} characters",
                MAX_IMAGE_URL_LEN
            )));
        }
        return Ok(());
    };

    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::Validation("Malformed data URL".to_string()))?;

    if !header.ends_with(";base64") {
        return Err(AppError::Validation(
            "Embedded images must be base64-encoded".to_string(),
        ));
    }
    if !header.starts_with("image/") {
        return Err(AppError::Validation(
            "Embedded data must be an image".to_string(),
        ));
    }

    // Reject obviously oversized payloads before decoding them.
    if payload.len() / 4 * 3 > max_bytes.saturating_add(3) {
        return Err(too_large(max_bytes));
    }

    let decoded = STANDARD
        .decode(payload.trim())
        .map_err(|_| AppError::Validation("Embedded image is not valid base64".to_string()))?;

    if decoded.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    Ok(())
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::Validation(format!("Embedded image exceeds {} bytes", max_bytes))
}
