use std::sync::{Mutex, PoisonError};

/// Single-assignment cell shared by every worker of a run.
///
/// The first `record` wins; later failures are handed back to their caller.
/// Read once with `into_inner` after all workers have joined.
#[derive(Debug)]
pub struct FirstError<E> {
    slot: Mutex<Option<E>>,
}

impl<E> Default for FirstError<E> {
    fn default() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }
}

impl<E> FirstError<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the slot if it is empty. Returns the error back if another one got there first.
    pub fn record(&self, error: E) -> Result<(), E> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(error);
        }
        *slot = Some(error);
        Ok(())
    }

    pub fn is_set(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn into_inner(self) -> Option<E> {
        self.slot
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
