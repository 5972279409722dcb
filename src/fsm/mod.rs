//! Function-pointer finite state machine for mesh connectivity.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StateTable                                                │
//! │  ┌──────────┬───────────┬──────────┬───────────────────┐   │
//! │  │ StateId  │ on_enter  │ on_exit  │ on_update         │   │
//! │  ├──────────┼───────────┼──────────┼───────────────────┤   │
//! │  │ Disabled │ fn(ctx)   │ —        │ fn(ctx)->Option<> │   │
//! │  │ Detached │ fn(ctx)   │ —        │ fn(ctx)->Option<> │   │
//! │  │ Attached │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │   │
//! │  └──────────┴───────────┴──────────┴───────────────────┘   │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! The machine is stepped once per role-change event rather than on a
//! clock.  `on_update` for the current state looks at the new role in the
//! context; if it returns `Some(next_id)`, the engine runs `on_exit` for
//! the current state, then `on_enter` for the next.  Handlers only write
//! commands into the context; [`monitor::ConnectivityMonitor`] applies
//! them after the step.

pub mod context;
pub mod monitor;
pub mod states;

use context::MonitorContext;
use log::info;

// ---------------------------------------------------------------------------
// Mesh role
// ---------------------------------------------------------------------------

/// Device role as reported by the mesh stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceRole {
    Disabled = 0,
    Detached = 1,
    Child = 2,
    Router = 3,
    Leader = 4,
}

impl DeviceRole {
    /// Map the stack's numeric role.  Unknown values are treated as
    /// detached.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Disabled,
            2 => Self::Child,
            3 => Self::Router,
            4 => Self::Leader,
            _ => Self::Detached,
        }
    }

    pub fn is_attached(self) -> bool {
        matches!(self, Self::Child | Self::Router | Self::Leader)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Detached => "detached",
            Self::Child => "child",
            Self::Router => "router",
            Self::Leader => "leader",
        }
    }
}

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Connectivity states.  Attached covers every attached role; moving
/// between Child, Router and Leader is not a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Disabled = 0,
    Detached = 1,
    Attached = 2,
}

impl StateId {
    pub const COUNT: usize = 3;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Disabled,
            2 => Self::Attached,
            _ => Self::Detached,
        }
    }

    /// State a node in `role` belongs in.
    pub fn for_role(role: DeviceRole) -> Self {
        match role {
            DeviceRole::Disabled => Self::Disabled,
            DeviceRole::Detached => Self::Detached,
            DeviceRole::Child | DeviceRole::Router | DeviceRole::Leader => Self::Attached,
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// `on_enter` / `on_exit` action; runs once per transition.
pub type StateActionFn = fn(&mut MonitorContext);

/// Per-event handler.  Returns `Some(next)` to trigger a transition.
pub type StateUpdateFn = fn(&mut MonitorContext) -> Option<StateId>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    /// Indexed by `StateId as usize`.
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    /// Role events processed so far.
    event_count: u64,
    /// Event count at which the current state was entered.
    state_entry_event: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        Self {
            table,
            current: initial as usize,
            event_count: 0,
            state_entry_event: 0,
        }
    }

    /// Run `on_enter` for the initial state.  Call once before `step()`.
    pub fn start(&mut self, ctx: &mut MonitorContext) {
        info!("CONN: starting in state {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Feed one role event (already stored in `ctx.role`).
    pub fn step(&mut self, ctx: &mut MonitorContext) {
        self.event_count += 1;
        ctx.events_in_state = self.event_count - self.state_entry_event;

        if let Some(next_id) = (self.table[self.current].on_update)(ctx) {
            self.transition(next_id, ctx);
        }
    }

    pub fn current_state(&self) -> StateId {
        self.table[self.current].id
    }

    pub fn state_name(&self) -> &'static str {
        self.table[self.current].name
    }

    /// Role events seen since the current state was entered.
    pub fn events_in_current_state(&self) -> u64 {
        self.event_count - self.state_entry_event
    }

    fn transition(&mut self, next_id: StateId, ctx: &mut MonitorContext) {
        let next_idx = next_id as usize;
        if next_idx == self.current {
            return;
        }

        info!(
            "CONN: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        self.state_entry_event = self.event_count;
        ctx.events_in_state = 0;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}
