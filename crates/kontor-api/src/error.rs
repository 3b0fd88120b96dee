// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("cannot reach {base_url} -- check that the backend is running ({source})")]
    Network {
        base_url: String,
        source: reqwest::Error,
    },

    #[error("server rejected the request ({status}): {reason}")]
    Rejected { status: u16, reason: String },

    #[error("decode {what}: {source}")]
    Decode {
        what: &'static str,
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    detail: Option<String>,
    error: Option<String>,
}

impl ApiError {
    /// Non-2xx response. The reason comes from the backend's JSON error
    /// envelope when there is one, else from a short plain-text body.
    pub fn rejected(status: u16, body: &str) -> Self {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
            let reason = envelope.detail.or(envelope.error);
            if let Some(reason) = reason
                && !reason.is_empty()
            {
                return Self::Rejected { status, reason };
            }
        }

        let trimmed = body.trim();
        if !trimmed.is_empty() && trimmed.len() < 200 && !trimmed.contains(['{', '<']) {
            return Self::Rejected {
                status,
                reason: trimmed.to_owned(),
            };
        }

        Self::Rejected {
            status,
            reason: "no further detail from the server".to_owned(),
        }
    }
}
