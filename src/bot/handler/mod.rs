// Exported functions
pub use self::account::{action_deploy, action_register};
pub use self::admin::{codes_response, money_response};
pub use self::economy::{action_balance, action_claim_code, action_coinflip, action_daily};
pub use self::general::{action_help, action_start};

// Submodules
mod account;
mod admin;
mod constants;
mod economy;
mod general;
pub mod utils;
