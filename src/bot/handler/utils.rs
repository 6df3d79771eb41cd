use teloxide::{prelude::*, types::UserId, RequestError};

use crate::bot::processor::ProcessError;

use super::constants::{COMMAND_REGISTER, GENERIC_ERROR_MESSAGE};

/* Common utilites for handlers. */

// Visual tone of a response. Every command outcome is rendered with exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
    Pending,
    Info,
    Win,
    Loss,
}

impl Tone {
    pub fn icon(self) -> &'static str {
        match self {
            Tone::Success => "✅",
            Tone::Failure => "❌",
            Tone::Pending => "⌛",
            Tone::Info => "💰",
            Tone::Win => "🎉",
            Tone::Loss => "😢",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub tone: Tone,
    pub title: String,
    pub body: String,
}

impl Response {
    pub fn new(tone: Tone, title: &str, body: impl Into<String>) -> Response {
        Response {
            tone,
            title: title.to_string(),
            body: body.into(),
        }
    }

    pub fn success(title: &str, body: impl Into<String>) -> Response {
        Response::new(Tone::Success, title, body)
    }

    pub fn failure(body: impl Into<String>) -> Response {
        Response::new(Tone::Failure, "Error", body)
    }

    pub fn pending(title: &str, body: impl Into<String>) -> Response {
        Response::new(Tone::Pending, title, body)
    }

    pub fn render(&self) -> String {
        format!("{} {}\n\n{}", self.tone.icon(), self.title, self.body)
    }
}

// Sends a new response message into a chat.
pub async fn send_response(
    bot: &Bot,
    chat_id: ChatId,
    response: &Response,
) -> Result<Message, RequestError> {
    bot.send_message(chat_id, response.render()).await
}

// Replaces a provisional message with the final response.
pub async fn edit_response(
    bot: &Bot,
    pending: &Message,
    response: &Response,
) -> Result<Message, RequestError> {
    bot.edit_message_text(pending.chat.id, pending.id, response.render())
        .await
}

// Sends text to the user's private chat. Returns false if the user cannot be reached there.
pub async fn send_private(bot: &Bot, user_id: UserId, text: String) -> bool {
    match bot.send_message(ChatId::from(user_id), text).await {
        Ok(_) => true,
        Err(err) => {
            log::error!("Private Message - Could not reach user {}: {}", user_id.0, err);
            false
        }
    }
}

// Failures of the panel or the database, as opposed to problems with the request itself.
pub fn is_internal(err: &ProcessError) -> bool {
    matches!(
        err,
        ProcessError::RemoteError(_) | ProcessError::StorageError(_)
    )
}

// Logs a failed command. Internal failures are errors, user mistakes are not.
pub fn log_failure(command: &str, user_id: &str, err: &ProcessError) {
    if is_internal(err) {
        log::error!("{} - User {} failed: {}", command, user_id, err);
    } else {
        log::info!("{} - User {} was refused: {}", command, user_id, err);
    }
}

// Error message shown to the user. Internal details never reach the chat.
pub fn error_response(err: &ProcessError) -> Response {
    let message = match err {
        ProcessError::InsufficientBalance { balance, required } => {
            format!("Not enough coins! You need {required} coins. Current: {balance}")
        }
        ProcessError::InvalidAmount(reason) => format!("{reason}."),
        ProcessError::InvalidCode => "Invalid code.".to_string(),
        ProcessError::CodeExhausted => "Code expired.".to_string(),
        ProcessError::NotRegistered => {
            format!("You don't have a panel account yet. Use {COMMAND_REGISTER} first!")
        }
        ProcessError::AlreadyRegistered => "You already have an account.".to_string(),
        ProcessError::NoNodesAvailable => "No nodes available.".to_string(),
        ProcessError::ProvisioningFailed => "Failed to deploy server.".to_string(),
        ProcessError::DailyCooldown { remaining_secs } => format!(
            "You already claimed your daily coins. Come back in {}!",
            format_cooldown(*remaining_secs)
        ),
        ProcessError::PermissionDenied => "No permission.".to_string(),
        ProcessError::RemoteError(_) | ProcessError::StorageError(_) => {
            GENERIC_ERROR_MESSAGE.to_string()
        }
    };
    Response::failure(message)
}

// Formats a remaining duration as hours and minutes, or seconds when short.
pub fn format_cooldown(secs: i64) -> String {
    let secs = secs.max(0);
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
