/* Constants used across handlers. */

// Commands
pub const COMMAND_HELP: &str = "/help";
pub const COMMAND_REGISTER: &str = "/register";
pub const COMMAND_DAILY: &str = "/daily";
pub const COMMAND_BALANCE: &str = "/balance";
pub const COMMAND_COINFLIP: &str = "/cf";
pub const COMMAND_DEPLOY: &str = "/deploy";
pub const COMMAND_CLAIM_CODE: &str = "/claimcode";

// Messages
pub const GENERIC_ERROR_MESSAGE: &str = "Something went wrong. Please try again later.";
pub const REGISTER_ERROR_MESSAGE: &str = "Failed to register. Try again later.";
pub const DEPLOY_ERROR_MESSAGE: &str = "Error deploying server. Try again later.";
