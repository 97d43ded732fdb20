use std::fmt;

use hiro_system_kit::Logger;

/// Logging handle shared by a package and every package derived from it.
#[derive(Clone, Default)]
pub struct Context {
    pub logger: Option<Logger>,
}

impl Context {
    pub fn empty() -> Context {
        Context { logger: None }
    }

    pub fn new(logger: Logger) -> Context {
        Context { logger: Some(logger) }
    }

    pub fn try_log<F>(&self, closure: F)
    where
        F: FnOnce(&Logger),
    {
        if let Some(ref logger) = self.logger {
            closure(logger)
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("logger", &self.logger.is_some()).finish()
    }
}
