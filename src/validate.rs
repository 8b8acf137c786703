//! Broker response validation
//!
//! The broker reports most failures inside a 2xx JSON body instead of through
//! the HTTP status, so every track batch result is checked here before the
//! orchestrator moves on.

use crate::error::ValidationError;
use crate::types::TracksResult;

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Check a track batch result. Rules apply in order and the first match wins:
/// session error, error on the first track, missing SDP when one is expected.
pub fn validate(result: &TracksResult, sdp_expected: bool) -> Result<(), ValidationError> {
    if present(&result.error_code).is_some() {
        return Err(ValidationError::Session(
            result.error_description.clone().unwrap_or_default(),
        ));
    }

    // Batches carry a single track, only the first one is inspected
    if let Some(description) = result.tracks.first().and_then(|t| present(&t.error_description)) {
        return Err(ValidationError::Track(description.to_string()));
    }

    if sdp_expected && result.session_description.is_none() {
        return Err(ValidationError::MissingSdp);
    }

    Ok(())
}
