//! Style normalization pass.
//!
//! Approved content goes through a final language pass (vocabulary, British
//! English, tone) before release, and every disclaimer the compliance review
//! required must appear verbatim in the released text. A style-service outage
//! never fails the request: the pre-normalization content is delivered with
//! the raw disclaimer text instead, and a degradation event is logged.

use std::sync::Arc;

use greencare_core::client::{ClientErrorKind, StyleClient};
use greencare_core::config::PipelineConfig;
use greencare_core::error::{GreencareError, Result};
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// The text released to the caller, with a degradation marker.
#[derive(Debug, Clone)]
pub struct NormalizedText {
    pub text: String,
    /// True when the style service was unavailable and the pre-normalization
    /// content was delivered instead.
    pub degraded: bool,
}

pub struct StyleNormalizer {
    client: Arc<dyn StyleClient>,
    config: PipelineConfig,
}

impl StyleNormalizer {
    pub fn new(client: Arc<dyn StyleClient>, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    /// Normalizes approved content and guarantees the required disclaimers
    /// appear verbatim.
    ///
    /// Must only be called with gate-approved content; fallback disclaimer
    /// text is already final and never passes through here.
    pub async fn normalize(
        &self,
        approved_content: &str,
        required_disclaimers: &[String],
        cancel: &CancellationToken,
    ) -> Result<NormalizedText> {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(GreencareError::Cancelled),
            result = self.client.normalize(
                approved_content,
                required_disclaimers,
                self.config.style_timeout(),
            ) => result,
        };

        match result {
            Ok(text) => Ok(NormalizedText {
                text: append_missing_disclaimers(text, required_disclaimers),
                degraded: false,
            }),
            Err(err) if err.kind == ClientErrorKind::Cancelled => Err(GreencareError::Cancelled),
            Err(err) => {
                warn!(error = %err, "style service unavailable, delivering un-normalized content");
                Ok(NormalizedText {
                    text: append_missing_disclaimers(
                        approved_content.to_string(),
                        required_disclaimers,
                    ),
                    degraded: true,
                })
            }
        }
    }
}

/// Appends any required disclaimer the text does not already contain,
/// verbatim, in the order given.
fn append_missing_disclaimers(mut text: String, disclaimers: &[String]) -> String {
    for disclaimer in disclaimers {
        if !text.contains(disclaimer.as_str()) {
            if !text.is_empty() {
                text.push_str("\n\n");
            }
            text.push_str(disclaimer);
        }
    }
    text
}
