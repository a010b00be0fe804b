use trylens_core::ids::TryId;

use crate::context;

/// Well-known correlation field carried on outbound frames and readable by
/// downstream subscribers correlating asynchronous replies.
pub const CORRELATION_HEADER: &str = "x-try-id";

/// A minimal outbound message frame. Header augmentation always rebuilds the
/// whole envelope, keeping destination, subscription, content type, and every
/// existing header intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    pub destination: String,
    pub subscription_id: Option<String>,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub payload: Vec<u8>,
}

/// Pure read-modify-produce transform: returns a new envelope carrying the
/// handle, never mutating the input (which another task may be sending).
pub fn inject(envelope: &MessageEnvelope, try_id: &TryId) -> MessageEnvelope {
    let mut headers: Vec<(String, String)> = envelope
        .headers
        .iter()
        .filter(|(key, _)| !key.eq_ignore_ascii_case(CORRELATION_HEADER))
        .cloned()
        .collect();
    headers.push((CORRELATION_HEADER.to_string(), try_id.to_string()));

    MessageEnvelope {
        destination: envelope.destination.clone(),
        subscription_id: envelope.subscription_id.clone(),
        content_type: envelope.content_type.clone(),
        headers,
        payload: envelope.payload.clone(),
    }
}

/// Attaches the ambient handle to at most one outbound frame per sampled
/// unit of work; a pass-through afterwards and outside any sampled scope.
pub fn inject_outbound(envelope: &MessageEnvelope) -> MessageEnvelope {
    match context::current_active() {
        Some(active) if active.claim_outbound() => inject(envelope, active.id()),
        _ => envelope.clone(),
    }
}

/// Reads a valid handle off an incoming envelope, if present.
pub fn extract(envelope: &MessageEnvelope) -> Option<TryId> {
    envelope
        .headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(CORRELATION_HEADER))
        .and_then(|(_, value)| TryId::parse(value).ok())
}

/// Reply/callback inflow: prefer the ambient handle, then the envelope's.
pub fn ambient_or_extract(envelope: &MessageEnvelope) -> Option<TryId> {
    context::current().or_else(|| extract(envelope))
}
