use crate::bot::{
    context::BotContext,
    dispatcher::Invoker,
    processor::{adjust_balance, create_code, MoneyAction},
};

use super::utils::{error_response, log_failure, Response};

/* Admin commands. Authorization happens in the dispatcher before these run.
 * Neither needs a chat round-trip, so they only build the response.
 */

/* Money command.
 * Sets, adds to, or removes from another user's balance.
 */
pub async fn money_response(
    ctx: &BotContext,
    invoker: &Invoker,
    action: MoneyAction,
    target: u64,
    amount: i64,
) -> Response {
    let admin_id = &invoker.identity.id;
    let target_id = target.to_string();

    match adjust_balance(&ctx.ledger, action, &target_id, amount).await {
        Ok(balance) => {
            log::info!(
                "Money - Admin {} did {} {} for user {}, balance {}",
                admin_id,
                action,
                amount,
                target_id,
                balance
            );
            Response::success(
                "Money Updated",
                format!("User {target_id} now has {balance} coins."),
            )
        }
        Err(err) => {
            log_failure("Money", admin_id, &err);
            error_response(&err)
        }
    }
}

/* Codes command.
 * Creates a fresh code worth `coins`, claimable `usages` times.
 */
pub async fn codes_response(
    ctx: &BotContext,
    invoker: &Invoker,
    usages: i64,
    coins: i64,
) -> Response {
    let admin_id = &invoker.identity.id;

    match create_code(&ctx.codes, usages, coins).await {
        Ok(code) => {
            log::info!(
                "Codes - Admin {} created code {} with {} usages of {} coins",
                admin_id,
                code,
                usages,
                coins
            );
            Response::success(
                "Code Created",
                format!("Code: {code}\nUsages: {usages}\nAmount: {coins}"),
            )
        }
        Err(err) => {
            log_failure("Codes", admin_id, &err);
            error_response(&err)
        }
    }
}
