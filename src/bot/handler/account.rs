use std::sync::Arc;

use teloxide::prelude::*;

use crate::bot::{
    context::BotContext,
    deploy::ServerDescriptor,
    dispatcher::{HandlerResult, Invoker},
    processor::ProcessError,
    registration::Registered,
};

use super::{
    constants::{DEPLOY_ERROR_MESSAGE, REGISTER_ERROR_MESSAGE},
    utils::{
        edit_response, error_response, is_internal, log_failure, send_private, send_response,
        Response,
    },
};

/* Both commands here talk to the panel, which can be slow.
 * They post a provisional message first and edit it into the final outcome.
 * Credentials only ever go to the user's private chat.
 */

fn credentials_message(panel_url: &str, registered: &Registered) -> String {
    let credentials = &registered.credentials;
    format!(
        "🔐 Your panel account\n\nLogin: {}\nUsername: {}\nEmail: {}\nPassword: {}",
        panel_url, credentials.username, credentials.email, credentials.password
    )
}

fn ssh_message(server: &ServerDescriptor) -> String {
    match &server.ssh {
        Some(ssh) => format!("🔑 SSH access for your new server on {}\n\n{}", server.node_name, ssh),
        None => format!(
            "🔑 Your new server on {} is ready. Find its connection details at {}",
            server.node_name, server.login_url
        ),
    }
}

fn deployed_body(server: &ServerDescriptor, sent_privately: bool) -> String {
    let mut lines = vec![
        "Your server has been deployed successfully!".to_string(),
        String::new(),
        format!("🔗 Login: {}", server.login_url),
        format!("🖥️ Node: {}", server.node_name),
    ];
    if let Some(image) = &server.node_image {
        lines.push(format!("📦 Image: {image}"));
    }
    lines.push(format!("💾 RAM: {} GB", server.memory_gb));
    lines.push(format!("⚙️ Cores: {}", server.cores));
    if let Some(balance) = server.balance {
        lines.push(format!("💰 Balance: {balance}"));
    }
    lines.push(String::new());
    if sent_privately {
        lines.push("Connection details were sent to you privately.".to_string());
    } else {
        lines.push(
            "I couldn't message you privately. Start a chat with me, then check the panel for connection details."
                .to_string(),
        );
    }
    lines.join("\n")
}

fn failure_response(err: &ProcessError, internal_message: &str) -> Response {
    if is_internal(err) {
        Response::failure(internal_message)
    } else {
        error_response(err)
    }
}

/* Register command.
 * Creates a panel account and sends its credentials privately.
 */
pub async fn action_register(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
    invoker: Invoker,
) -> HandlerResult {
    let user_id = &invoker.identity.id;

    // Refuse known users before bothering the panel
    match ctx.gateway.is_registered(user_id) {
        Ok(false) => {}
        Ok(true) => {
            log_failure("Register", user_id, &ProcessError::AlreadyRegistered);
            send_response(
                &bot,
                msg.chat.id,
                &error_response(&ProcessError::AlreadyRegistered),
            )
            .await?;
            return Ok(());
        }
        Err(err) => {
            let err = ProcessError::from(err);
            log_failure("Register", user_id, &err);
            send_response(
                &bot,
                msg.chat.id,
                &failure_response(&err, REGISTER_ERROR_MESSAGE),
            )
            .await?;
            return Ok(());
        }
    }

    let pending = send_response(
        &bot,
        msg.chat.id,
        &Response::pending("Creating Account..", "Setting up your panel account."),
    )
    .await?;

    let response = match ctx.gateway.register_account(&invoker.identity).await {
        Ok(registered) => {
            log::info!(
                "Register - User {} registered as panel user {}",
                user_id,
                registered.remote_id
            );
            let message = credentials_message(&ctx.config.panel_url, &registered);
            if send_private(&bot, invoker.user_id, message).await {
                Response::success(
                    "Account Created",
                    "Check your private messages for your login details.",
                )
            } else {
                Response::failure(
                    "Your account was created, but I couldn't message you privately. Start a chat with me and ask an admin for your login details.",
                )
            }
        }
        Err(err) => {
            log_failure("Register", user_id, &err);
            failure_response(&err, REGISTER_ERROR_MESSAGE)
        }
    };

    edit_response(&bot, &pending, &response).await?;
    Ok(())
}

/* Deploy command.
 * Provisions a server on the panel and charges the deploy cost once it exists.
 */
pub async fn action_deploy(
    bot: Bot,
    msg: Message,
    ctx: Arc<BotContext>,
    invoker: Invoker,
) -> HandlerResult {
    let user_id = &invoker.identity.id;

    // Cheap check first, so broke users never see a provisional message
    if let Err(err) = ctx.orchestrator.check_balance(user_id) {
        log_failure("Deploy", user_id, &err);
        send_response(
            &bot,
            msg.chat.id,
            &failure_response(&err, DEPLOY_ERROR_MESSAGE),
        )
        .await?;
        return Ok(());
    }

    let pending = send_response(
        &bot,
        msg.chat.id,
        &Response::pending("Deploying Server..", "Talking to the panel, hold on."),
    )
    .await?;

    let response = match ctx.orchestrator.deploy(&invoker.identity).await {
        Ok(server) => {
            log::info!(
                "Deploy - User {} deployed a server on node {}",
                user_id,
                server.node_name
            );
            let sent_privately = send_private(&bot, invoker.user_id, ssh_message(&server)).await;
            Response::success("Server Deployed", deployed_body(&server, sent_privately))
        }
        Err(err) => {
            log_failure("Deploy", user_id, &err);
            failure_response(&err, DEPLOY_ERROR_MESSAGE)
        }
    };

    edit_response(&bot, &pending, &response).await?;
    Ok(())
}
