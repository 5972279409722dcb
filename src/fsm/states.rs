//! Connectivity state handlers and table builder.
//!
//! ```text
//!  DETACHED ◀────▶ ATTACHED ◀────▶ DISABLED
//!     ▲                               │
//!     └───────────────────────────────┘
//! ```
//!
//! Every state follows the reported role: child/router/leader selects
//! ATTACHED, detached selects DETACHED, disabled selects DISABLED.
//!
//! Entering ATTACHED claims the registration guard; only the first claim
//! requests registration.

use super::context::MonitorContext;
use super::{StateDescriptor, StateId};
use log::{debug, info};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Disabled
        StateDescriptor {
            id: StateId::Disabled,
            name: "Disabled",
            on_enter: Some(disabled_enter),
            on_exit: None,
            on_update: disabled_update,
        },
        // Index 1 — Detached
        StateDescriptor {
            id: StateId::Detached,
            name: "Detached",
            on_enter: Some(detached_enter),
            on_exit: None,
            on_update: detached_update,
        },
        // Index 2 — Attached
        StateDescriptor {
            id: StateId::Attached,
            name: "Attached",
            on_enter: Some(attached_enter),
            on_exit: Some(attached_exit),
            on_update: attached_update,
        },
    ]
}

/// Target state for the role in `ctx`, if it differs from `current`.
fn follow_role(ctx: &MonitorContext, current: StateId) -> Option<StateId> {
    let next = StateId::for_role(ctx.role);
    (next != current).then_some(next)
}

// ═══════════════════════════════════════════════════════════════════════════
//  DISABLED — mesh interface down
// ═══════════════════════════════════════════════════════════════════════════

fn disabled_enter(ctx: &mut MonitorContext) {
    ctx.commands.connection_indicator = Some(false);
    ctx.commands.close_provisioning = true;
    info!("CONN: mesh disabled");
}

fn disabled_update(ctx: &mut MonitorContext) -> Option<StateId> {
    follow_role(ctx, StateId::Disabled)
}

// ═══════════════════════════════════════════════════════════════════════════
//  DETACHED — searching for a parent / partition
// ═══════════════════════════════════════════════════════════════════════════

fn detached_enter(ctx: &mut MonitorContext) {
    ctx.commands.connection_indicator = Some(false);
    ctx.commands.close_provisioning = true;
    info!("CONN: detached");
}

fn detached_update(ctx: &mut MonitorContext) -> Option<StateId> {
    follow_role(ctx, StateId::Detached)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ATTACHED — child, router or leader
// ═══════════════════════════════════════════════════════════════════════════

fn attached_enter(ctx: &mut MonitorContext) {
    ctx.commands.connection_indicator = Some(true);
    if ctx.registration.claim() {
        ctx.commands.register = true;
        info!("CONN: attached as {}, registering service", ctx.role.name());
    } else {
        info!(
            "CONN: re-attached as {}, keeping existing registration",
            ctx.role.name()
        );
    }
}

fn attached_exit(ctx: &mut MonitorContext) {
    debug!(
        "CONN: leaving attached after {} role events",
        ctx.events_in_state
    );
}

fn attached_update(ctx: &mut MonitorContext) -> Option<StateId> {
    let next = follow_role(ctx, StateId::Attached);
    if next.is_none() {
        debug!("CONN: attached role now {}", ctx.role.name());
    }
    next
}
