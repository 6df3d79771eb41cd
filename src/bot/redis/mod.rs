// Exported functions
pub use self::connect::{open, test_redis_connection};

// Exported structs and types
pub use self::connect::DBError;
pub use self::manager::RedisStore;

// Submodules
mod account;
mod balance;
mod code;
mod connect;
mod daily;
mod manager;
mod settlement;
