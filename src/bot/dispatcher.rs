use std::sync::Arc;

use teloxide::{prelude::*, types::UserId, utils::command::BotCommands, RequestError};

use super::{
    config::Config,
    context::BotContext,
    handler::{
        action_balance, action_claim_code, action_coinflip, action_daily, action_deploy,
        action_help, action_register, action_start, codes_response, money_response,
        utils::{error_response, send_response, Response},
    },
    processor::{CoinSide, MoneyAction, ProcessError},
    registration::Identity,
};

/* Dispatcher is the entry point for every inbound command.
 * It parses the command, works out who sent it, enforces admin-only commands,
 * and routes to exactly one handler, which renders exactly one response.
 * Registration is only required for deploying; the economy commands work for anyone.
 */

/* Types */
pub type HandlerResult = Result<(), BotError>;

#[derive(thiserror::Error, Debug)]
pub enum BotError {
    #[error("Request error: {0}")]
    RequestError(RequestError),
}

impl From<RequestError> for BotError {
    fn from(request_error: RequestError) -> BotError {
        BotError::RequestError(request_error)
    }
}

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "Show the welcome message.")]
    Start,
    #[command(description = "Show this help message.")]
    Help,
    #[command(description = "Register a new panel account.")]
    Register,
    #[command(description = "Claim your daily coins.")]
    Daily,
    #[command(description = "Show your coin balance.")]
    Balance,
    #[command(description = "Coinflip: /cf heads|tails bet", parse_with = "split")]
    Cf { choice: CoinSide, bet: i64 },
    #[command(description = "Deploy a server if you have enough coins.")]
    Deploy,
    #[command(description = "Claim a coin code: /claimcode code")]
    Claimcode { code: String },
    #[command(
        description = "Admin. Manage user money: /money set|add|remove user_id amount",
        parse_with = "split"
    )]
    Money {
        action: MoneyAction,
        target: u64,
        amount: i64,
    },
    #[command(
        description = "Admin. Create a redeem code: /codes usages coins",
        parse_with = "split"
    )]
    Codes { usages: i64, coins: i64 },
}

impl Command {
    pub fn is_admin_only(&self) -> bool {
        matches!(self, Command::Money { .. } | Command::Codes { .. })
    }

    // Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "Start",
            Command::Help => "Help",
            Command::Register => "Register",
            Command::Daily => "Daily",
            Command::Balance => "Balance",
            Command::Cf { .. } => "Coinflip",
            Command::Deploy => "Deploy",
            Command::Claimcode { .. } => "Claim Code",
            Command::Money { .. } => "Money",
            Command::Codes { .. } => "Codes",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    pub user_id: UserId,
    pub identity: Identity,
    pub is_admin: bool,
}

impl Invoker {
    pub fn new(user_id: UserId, username: Option<String>, config: &Config) -> Invoker {
        Invoker {
            user_id,
            identity: Identity {
                id: user_id.0.to_string(),
                username,
            },
            is_admin: config.is_admin(user_id.0),
        }
    }
}

// Admin-only commands need the admin claim. Checked before any handler runs.
pub fn authorize(cmd: &Command, invoker: &Invoker) -> Result<(), ProcessError> {
    if cmd.is_admin_only() && !invoker.is_admin {
        Err(ProcessError::PermissionDenied)
    } else {
        Ok(())
    }
}

/* Runs an admin-only command and returns its response.
 * Authorization is checked first, so a refused command never reaches the ledger or code store.
 * None for commands that are not admin-only.
 */
pub async fn admin_response(
    ctx: &BotContext,
    invoker: &Invoker,
    cmd: &Command,
) -> Option<Response> {
    if !cmd.is_admin_only() {
        return None;
    }
    if let Err(err) = authorize(cmd, invoker) {
        log::warn!(
            "{} - User {} denied: {}",
            cmd.name(),
            invoker.identity.id,
            err
        );
        return Some(error_response(&err));
    }

    match *cmd {
        Command::Money {
            action,
            target,
            amount,
        } => Some(money_response(ctx, invoker, action, target, amount).await),
        Command::Codes { usages, coins } => {
            Some(codes_response(ctx, invoker, usages, coins).await)
        }
        _ => None,
    }
}

/* Routes one parsed command to its handler.
 * Messages without a sender (channel posts, service messages) are ignored.
 */
async fn route(bot: Bot, msg: Message, cmd: Command, ctx: Arc<BotContext>) -> HandlerResult {
    let (user_id, username) = match msg.from() {
        Some(user) => (user.id, user.username.clone()),
        None => return Ok(()),
    };
    let invoker = Invoker::new(user_id, username, &ctx.config);

    if let Some(response) = admin_response(&ctx, &invoker, &cmd).await {
        send_response(&bot, msg.chat.id, &response).await?;
        return Ok(());
    }

    match cmd {
        Command::Start => action_start(bot, msg).await,
        Command::Help => action_help(bot, msg).await,
        Command::Register => action_register(bot, msg, ctx, invoker).await,
        Command::Daily => action_daily(bot, msg, ctx, invoker).await,
        Command::Balance => action_balance(bot, msg, ctx, invoker).await,
        Command::Cf { choice, bet } => action_coinflip(bot, msg, ctx, invoker, choice, bet).await,
        Command::Deploy => action_deploy(bot, msg, ctx, invoker).await,
        Command::Claimcode { code } => action_claim_code(bot, msg, ctx, invoker, code).await,
        // Answered by admin_response
        Command::Money { .. } | Command::Codes { .. } => Ok(()),
    }
}

/* Main Dispatch function */
pub async fn run_dispatcher(bot: Bot, ctx: Arc<BotContext>) {
    if let Err(err) = bot.set_my_commands(Command::bot_commands()).await {
        log::warn!("Failed to register bot commands: {}", err);
    }

    let handler = Update::filter_message()
        .branch(teloxide::filter_command::<Command, _>().endpoint(route));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![ctx])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
