// bot/mod.rs

// Exported functions
pub use self::dispatcher::run_dispatcher;

// Exported structs and types
pub use self::config::{Config, ConfigError};
pub use self::context::{BotContext, StartupError};
pub use self::dispatcher::{BotError, Command, HandlerResult};

// Declare submodules
mod api;
mod codes;
mod config;
mod context;
mod deploy;
mod dispatcher;
mod handler;
mod ledger;
mod locks;
mod processor;
mod redis;
mod registration;
mod store;
