use slog::Logger;

/// Ambient state threaded through the engine: currently the optional logger.
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

    /// Derives a context whose records carry the given block as structured keys.
    pub fn for_block(&self, kind: &str, name: &str) -> Context {
        Context {
            logger: self
                .logger
                .as_ref()
                .map(|logger| logger.new(o!("block_kind" => kind.to_string(), "block_name" => name.to_string()))),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context").field("logging", &self.logger.is_some()).finish()
    }
}
