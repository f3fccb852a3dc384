/*
[INPUT]:  Inbound WebSocket text frames
[OUTPUT]: Payloads routed to the registry listeners of the resolved channel
[POS]:    WebSocket layer - inbound routing
[UPDATE]: When adding channels or changing discard rules
*/

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, info, warn};

use super::message::{FrameError, InboundFrame, decode_frame};
use super::registry::{SubscriptionRegistry, dispatch};

const MESSAGE_SAMPLE_LIMIT: usize = 3;
const DISCARD_LOG_LIMIT: usize = 5;
const RAW_LOG_MAX_BYTES: usize = 1024;

static MESSAGE_SAMPLE_COUNT: AtomicUsize = AtomicUsize::new(0);
static DISCARD_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// What happened to one inbound frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Routed to this many listeners (zero when nobody listens on the key)
    Delivered(usize),
    ServerError,
    Discarded,
}

/// Decode `raw` and hand the payload to the registry
pub fn dispatch_text(registry: &Mutex<SubscriptionRegistry>, raw: &str) -> DispatchOutcome {
    match decode_frame(raw) {
        Ok(InboundFrame::Data(payload)) => {
            let key = payload.channel_key();
            log_message_sample_once(&key.to_string());
            let delivered = dispatch(registry, &key, &payload);
            if delivered == 0 {
                debug!(channel = %key, "ws message for channel without listeners");
            }
            DispatchOutcome::Delivered(delivered)
        }
        Ok(InboundFrame::ServerError(err)) => {
            warn!(
                error = %err.error,
                request_id = err.request_id.as_deref().unwrap_or("-"),
                "ws server reported error"
            );
            DispatchOutcome::ServerError
        }
        Err(err) => {
            log_discard_once(&err, raw);
            DispatchOutcome::Discarded
        }
    }
}

fn log_message_sample_once(channel: &str) {
    let count = MESSAGE_SAMPLE_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < MESSAGE_SAMPLE_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = MESSAGE_SAMPLE_LIMIT,
            channel,
            "ws message sample"
        );
    }
}

fn log_discard_once(err: &FrameError, raw: &str) {
    let count = DISCARD_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < DISCARD_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = DISCARD_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message discarded"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = DISCARD_LOG_LIMIT,
            message = %preview,
            "ws message discarded"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}
