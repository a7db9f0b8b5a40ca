//! Press/hold/release command timing
//!
//! One device command becomes a timed pulse train on the hold-action
//! channel: a press immediately, a repeat press every 200 ms while the
//! requested duration (less a 250 ms lookahead) has not elapsed, then
//! exactly one release once the duration has run out. The sequence is
//! never cancelled once started.

use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use harmony_bus::StateBus;
use harmony_client::{press_payload, release_payload};
use harmony_core::{encode_action, HOLD_ACTION_CHANNEL};

use crate::SessionContext;

/// Cadence of repeat presses while holding
const PRESS_INTERVAL: Duration = Duration::from_millis(200);

/// A repeat press is only worth sending if at least this much hold time
/// remains
const RELEASE_LOOKAHEAD_MS: u64 = 250;

/// Drive one press/hold/release sequence for the command entry at `key`,
/// then acknowledge the entry back to `0`.
///
/// Missing entry metadata or an absent session are warned and resolved
/// with an immediate acknowledgement; nothing is sent.
pub async fn send_command(ctx: &SessionContext, key: &str, duration_ms: u64) {
    let meta = match ctx.bus().get_object(key).await {
        Ok(Some(meta)) => meta,
        Ok(None) | Err(_) => {
            warn!(key, "cannot send command, unknown state");
            ctx.ack_zero(key).await;
            return;
        }
    };
    let Some(action) = meta.native.get("action").and_then(Value::as_str) else {
        warn!(key, "cannot send command, entry has no action");
        ctx.ack_zero(key).await;
        return;
    };
    let Some(client) = ctx.client().await else {
        warn!(key, "error sending command, client offline");
        ctx.ack_zero(key).await;
        return;
    };

    debug!(command = %meta.name, duration_ms, "sending command");
    let encoded = encode_action(action);
    let started = Instant::now();

    let payload = press_payload(ctx.session_elapsed_ms().await, &encoded);
    if let Err(e) = client.send(HOLD_ACTION_CHANNEL, &payload).await {
        warn!(error = %e, "press pulse failed");
    }

    loop {
        let elapsed = started.elapsed().as_millis() as u64;
        if elapsed + RELEASE_LOOKAHEAD_MS <= duration_ms {
            tokio::time::sleep(PRESS_INTERVAL).await;
            let payload = press_payload(ctx.session_elapsed_ms().await, &encoded);
            if let Err(e) = client.send(HOLD_ACTION_CHANNEL, &payload).await {
                warn!(error = %e, "press pulse failed");
            }
        } else {
            tokio::time::sleep(Duration::from_millis(duration_ms.saturating_sub(elapsed))).await;
            let payload = release_payload(ctx.session_elapsed_ms().await, &encoded);
            if let Err(e) = client.send(HOLD_ACTION_CHANNEL, &payload).await {
                warn!(error = %e, "release pulse failed");
            }
            break;
        }
    }

    ctx.ack_zero(key).await;
}
