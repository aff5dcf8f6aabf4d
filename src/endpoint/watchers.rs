//! Registry of observers interested in an endpoint's signals.

use std::sync::Arc;

use super::error::PipeError;
use super::signals::SignalsState;

/// Receives signal-state changes for an endpoint.
///
/// Called with the endpoint's lock held: implementations must not call back
/// into the same endpoint synchronously.
pub trait Watcher: Send + Sync {
    fn on_signals_changed(&self, context: u64, state: SignalsState);

    /// Terminal notification. The registration is gone once this fires.
    fn on_closed(&self, context: u64);
}

struct Entry {
    watcher: Arc<dyn Watcher>,
    context: u64,
}

impl Entry {
    fn is(&self, watcher: &Arc<dyn Watcher>, context: u64) -> bool {
        Arc::ptr_eq(&self.watcher, watcher) && self.context == context
    }
}

/// Set of `(watcher, context)` registrations.
#[derive(Default)]
pub struct WatcherSet {
    entries: Vec<Entry>,
    last_known: Option<SignalsState>,
}

impl WatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register and immediately report `state` to the new watcher.
    pub fn add(
        &mut self,
        watcher: Arc<dyn Watcher>,
        context: u64,
        state: SignalsState,
    ) -> Result<(), PipeError> {
        if self.entries.iter().any(|e| e.is(&watcher, context)) {
            return Err(PipeError::AlreadyExists);
        }
        self.entries.push(Entry {
            watcher: watcher.clone(),
            context,
        });

        match self.last_known {
            // The snapshot moved since the last fan-out; everyone needs it.
            Some(last) if last != state => self.notify_state(state),
            _ => watcher.on_signals_changed(context, state),
        }
        Ok(())
    }

    pub fn remove(&mut self, watcher: &Arc<dyn Watcher>, context: u64) -> Result<(), PipeError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.is(watcher, context))
            .ok_or(PipeError::NotFound)?;
        self.entries.swap_remove(index);
        Ok(())
    }

    /// Fan `state` out to every watcher unless it was already delivered.
    pub fn notify_state(&mut self, state: SignalsState) {
        if self.last_known == Some(state) {
            return;
        }
        self.last_known = Some(state);
        for entry in &self.entries {
            entry.watcher.on_signals_changed(entry.context, state);
        }
    }

    /// Deliver the terminal notification and drop every registration.
    pub fn notify_closed(&mut self) {
        for entry in self.entries.drain(..) {
            entry.watcher.on_closed(entry.context);
        }
    }
}
