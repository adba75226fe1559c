#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate hiro_system_kit;

pub extern crate stacks_wallet_kit as kit;

pub mod broadcast;
pub mod decoder;
pub mod finalizer;
pub mod flow;
pub mod settings;
pub mod state;
pub mod validation;

use hiro_system_kit::Logger;

#[derive(Clone)]
pub struct Context {
    pub logger: Option<Logger>,
    pub tracer: bool,
}

impl Context {
    pub fn empty() -> Context {
        Context { logger: None, tracer: false }
    }

    pub fn new(logger: Logger) -> Context {
        Context { logger: Some(logger), tracer: false }
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

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("logger", &self.logger.is_some())
            .field("tracer", &self.tracer)
            .finish()
    }
}
