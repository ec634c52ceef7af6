// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Duration strings such as `30d` or `12h`.

use chrono::Utc;

use crate::error::{VaultError, VaultResult};

/// Parse `<n><unit>` (units `s m h d w`) into seconds.
///
/// Returns `None` for malformed, zero or overflowing values.
pub fn parse_duration(value: &str) -> Option<i64> {
    let value = value.trim();
    let unit = value.chars().last()?;
    let number: i64 = value[..value.len() - unit.len_utf8()].parse().ok()?;
    let multiplier = match unit.to_ascii_lowercase() {
        's' => 1,
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        'w' => 604_800,
        _ => return None,
    };
    let seconds = number.checked_mul(multiplier)?;
    (seconds > 0).then_some(seconds)
}

/// Retention policy: an absent or invalid value disables the policy.
pub fn retention_seconds(policy: &str) -> Option<i64> {
    if policy.trim().is_empty() {
        return None;
    }
    let parsed = parse_duration(policy);
    if parsed.is_none() {
        tracing::warn!(policy, "Ignoring invalid retention period");
    }
    parsed
}

/// Absolute unix end time for an expiration string. Hard error when invalid.
pub fn end_time(expiration: &str) -> VaultResult<i64> {
    let seconds = parse_duration(expiration)
        .ok_or_else(|| VaultError::Validation("failed to parse expiration".to_string()))?;
    Ok(Utc::now().timestamp() + seconds)
}

/// Like [`end_time`], but clamped to `max` when a valid cap is configured.
pub fn capped_end_time(expiration: &str, max: &str) -> VaultResult<i64> {
    let requested = parse_duration(expiration)
        .ok_or_else(|| VaultError::Validation("failed to parse expiration".to_string()))?;
    let seconds = match retention_seconds(max) {
        Some(cap) => requested.min(cap),
        None => requested,
    };
    Ok(Utc::now().timestamp() + seconds)
}
