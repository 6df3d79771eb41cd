use teloxide::{prelude::*, utils::command::BotCommands};

use crate::bot::dispatcher::{Command, HandlerResult};

use super::{
    constants::{
        COMMAND_BALANCE, COMMAND_CLAIM_CODE, COMMAND_COINFLIP, COMMAND_DAILY, COMMAND_DEPLOY,
        COMMAND_HELP, COMMAND_REGISTER,
    },
    utils::{send_response, Response, Tone},
};

/* Start command.
 * Displays a welcome message to the user.
 */
pub async fn action_start(bot: Bot, msg: Message) -> HandlerResult {
    let introduction = "I hand out coins, and coins buy servers! 🖥️";
    let account_info = format!("✍️ First, get yourself a panel account with {COMMAND_REGISTER}.");
    let coin_info = format!("🪙 Collect coins with {COMMAND_DAILY}, try your luck with {COMMAND_COINFLIP}, or redeem a code with {COMMAND_CLAIM_CODE}. Keep an eye on your {COMMAND_BALANCE}!");
    let deploy_info = format!("🚀 Once you have enough, {COMMAND_DEPLOY} your own server.");
    let closing = format!("🤗 Ask me for {COMMAND_HELP} anytime!");

    send_response(
        &bot,
        msg.chat.id,
        &Response::new(
            Tone::Info,
            "Welcome!",
            format!("{introduction}\n\n{account_info}\n\n{coin_info}\n\n{deploy_info}\n\n{closing}"),
        ),
    )
    .await?;
    Ok(())
}

/* Help command.
 * Displays a list of commands available to the user.
 */
pub async fn action_help(bot: Bot, msg: Message) -> HandlerResult {
    let commands = Command::descriptions().to_string();

    send_response(
        &bot,
        msg.chat.id,
        &Response::new(Tone::Info, "My Commands", commands),
    )
    .await?;
    Ok(())
}
