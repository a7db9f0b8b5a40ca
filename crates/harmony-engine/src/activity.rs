//! Activity state machine
//!
//! Tracks which activity is running and reflects digest events into the
//! state tree, enforcing the invariant that at most one activity reads
//! `Running` at any instant — on every digest, not just on transitions.

use tracing::{debug, warn};

use harmony_bus::{StateBus, StateValue};
use harmony_core::{ActivityStatus, StateDigest, POWER_OFF_ACTIVITY};

use crate::SessionContext;

/// Execute an activity switch requested from the bus.
///
/// `value == 0` requests a hub-wide power-off; any other value with a
/// known label starts that activity. Completion never depends on the hub
/// call's outcome — the confirmation arrives later as a digest.
pub async fn switch_activity(ctx: &SessionContext, label: Option<&str>, value: i64) {
    let Some(client) = ctx.client().await else {
        warn!("error changing activity, client offline");
        return;
    };

    if value == 0 {
        debug!("turning activity off");
        if let Err(e) = client.turn_off().await {
            warn!(error = %e, "turn off failed");
        }
        return;
    }

    let id = {
        let maps = ctx.maps.read().await;
        label.and_then(|l| maps.activity_id(l)).map(String::from)
    };
    match id {
        Some(id) => {
            debug!(activity = label, "switching activity");
            if let Err(e) = client.start_activity(&id).await {
                warn!(error = %e, "start activity failed");
            }
        }
        None => warn!(?label, "activity does not exist"),
    }
}

/// Reflect a digest pushed by the hub.
pub async fn apply_digest(ctx: &SessionContext, digest: &StateDigest) {
    set_current_activity(ctx, &digest.activity_id).await;
    set_current_status(ctx, digest.status).await;

    if digest.activity_id != POWER_OFF_ACTIVITY {
        set_activity_status(ctx, &digest.activity_id, digest.status).await;
        if digest.status == ActivityStatus::Running {
            // Only one activity can run at once
            force_others_off(ctx, &digest.activity_id).await;
        }
    } else {
        force_others_off(ctx, POWER_OFF_ACTIVITY).await;
    }
}

/// Seed the reflection from the initial current-activity fetch after a
/// connect: the reported activity (if any) is running, everything else
/// is off.
pub async fn seed_current_activity(ctx: &SessionContext, activity_id: &str) {
    set_current_activity(ctx, activity_id).await;
    if activity_id != POWER_OFF_ACTIVITY {
        set_activity_status(ctx, activity_id, ActivityStatus::Running).await;
        set_current_status(ctx, ActivityStatus::Running).await;
    } else {
        set_current_status(ctx, ActivityStatus::Off).await;
    }
    force_others_off(ctx, activity_id).await;
}

async fn force_others_off(ctx: &SessionContext, running_id: &str) {
    let others: Vec<String> = {
        let maps = ctx.maps.read().await;
        maps.activity_ids()
            .filter(|id| *id != running_id)
            .map(String::from)
            .collect()
    };
    for id in others {
        set_activity_status(ctx, &id, ActivityStatus::Off).await;
    }
}

async fn set_current_activity(ctx: &SessionContext, activity_id: &str) {
    let ident = {
        let maps = ctx.maps.read().await;
        maps.activity_ident(activity_id).map(String::from)
    };
    let Some(ident) = ident else {
        warn!(activity_id, "unknown activity id");
        return;
    };
    debug!(activity = %ident, "current activity");
    let key = ctx.tree.lock().await.current_activity_key();
    if let Err(e) = ctx.bus().set_state(&key, StateValue::acked(ident)).await {
        warn!(error = %e, "could not reflect current activity");
    }
}

async fn set_current_status(ctx: &SessionContext, status: ActivityStatus) {
    let tree = ctx.tree.lock().await;
    if !tree.is_initialized() {
        return;
    }
    let key = tree.current_status_key();
    drop(tree);
    if let Err(e) = ctx
        .bus()
        .set_state(&key, StateValue::acked(status.as_i64()))
        .await
    {
        warn!(error = %e, "could not reflect current status");
    }
}

async fn set_activity_status(ctx: &SessionContext, activity_id: &str, status: ActivityStatus) {
    if activity_id == POWER_OFF_ACTIVITY {
        return;
    }
    let ident = {
        let maps = ctx.maps.read().await;
        maps.activity_ident(activity_id).map(String::from)
    };
    let Some(ident) = ident else {
        warn!(activity_id, "unknown activity id");
        return;
    };
    let key = ctx.tree.lock().await.activity_key(&ident);
    if let Err(e) = ctx
        .bus()
        .set_state(&key, StateValue::acked(status.as_i64()))
        .await
    {
        warn!(error = %e, "could not reflect activity status");
    }
}
