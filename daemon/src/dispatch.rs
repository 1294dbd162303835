//! Ordered dispatch of key transitions to handler modules.
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::hotkey::Hotkey;
use crate::modules::Module;

/// Offers each transition to the modules in registration order until one claims it.
pub struct Dispatcher {
    modules: Vec<Box<dyn Module>>,
}

impl Dispatcher {
    pub fn new(modules: Vec<Box<dyn Module>>) -> Self {
        Self { modules }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if a module claimed the transition, in which case no later
    /// module sees it.
    ///
    /// A module that panics is treated as not having claimed the event and the
    /// chain continues with the next module.
    pub fn dispatch(&mut self, hotkey: Hotkey, down: bool) -> bool {
        for module in &mut self.modules {
            match catch_unwind(AssertUnwindSafe(|| module.handle_key(&hotkey, down))) {
                Ok(true) => {
                    tracing::debug!(module = module.name(), %hotkey, down, "claimed");
                    return true;
                }
                Ok(false) => {}
                Err(_) => {
                    tracing::error!(module = module.name(), %hotkey, down, "handler panicked");
                }
            }
        }
        false
    }
}
