//! Request-id allocation and response routing.
//!
//! Every command sent on the primary channel gets a fresh non-zero id; a
//! continuation may be registered under it. When a response arrives its
//! continuation is moved out of the table *before* it runs, so continuations
//! are free to send further commands (and register new continuations).
//! Request id `0` is reserved for unsolicited events.

use std::collections::HashMap;

use histfetch_types::{Function, Object};

use crate::channel::{PrimaryChannel, Response};

/// A continuation invoked once with the response to its request.
pub type Handler<Ctx> = Box<dyn FnOnce(&mut Ctx, Object)>;

// ─── QueryDispatcher ──────────────────────────────────────────────────────────

/// Owns the pending-continuation table of one drive context.
pub struct QueryDispatcher<Ctx> {
    current_id: u64,
    handlers:   HashMap<u64, Handler<Ctx>>,
}

impl<Ctx> QueryDispatcher<Ctx> {
    pub fn new() -> Self {
        Self { current_id: 0, handlers: HashMap::new() }
    }

    /// Allocate a fresh request id (never `0`).
    pub fn next_id(&mut self) -> u64 {
        self.current_id = self.current_id.wrapping_add(1);
        if self.current_id == 0 {
            self.current_id = 1;
        }
        self.current_id
    }

    /// Register `handler` (if any) under a fresh id, then hand `function` to
    /// `channel`. Without a handler the command is fire-and-forget.
    pub fn send<C: PrimaryChannel + ?Sized>(
        &mut self,
        channel:  &mut C,
        function: Function,
        handler:  Option<Handler<Ctx>>,
    ) -> u64 {
        let id = self.next_id();
        if let Some(h) = handler {
            self.handlers.insert(id, h);
        }
        log::trace!("[histfetch] -> {} (#{id})", function.kind());
        channel.send(id, function);
        id
    }

    /// Remove and return the continuation registered under `id`.
    pub fn take(&mut self, id: u64) -> Option<Handler<Ctx>> {
        self.handlers.remove(&id)
    }

    /// Number of continuations still waiting for a response.
    pub fn pending(&self) -> usize {
        self.handlers.len()
    }
}

impl<Ctx> Default for QueryDispatcher<Ctx> {
    fn default() -> Self { Self::new() }
}

// ─── Dispatch ─────────────────────────────────────────────────────────────────

/// A drive context that owns a [`QueryDispatcher`] over itself.
pub trait Dispatch: Sized {
    fn dispatcher(&mut self) -> &mut QueryDispatcher<Self>;

    /// Called for every unsolicited event (request id `0`).
    fn on_event(&mut self, event: Object);
}

/// Route `response` to its continuation, or to [`Dispatch::on_event`].
///
/// A response whose id has no continuation (fire-and-forget, or a late
/// duplicate) is dropped.
pub fn on_response<Ctx: Dispatch>(ctx: &mut Ctx, response: Response) {
    let Response { request_id, object } = response;
    if request_id == 0 {
        return ctx.on_event(object);
    }
    match ctx.dispatcher().take(request_id) {
        Some(handler) => handler(ctx, object),
        None => log::debug!("[histfetch] No continuation for #{request_id} ({})", object.kind()),
    }
}
