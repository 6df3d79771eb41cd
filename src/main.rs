use std::{process, sync::Arc};

use panelbot::bot::{run_dispatcher, BotContext, Config};

#[tokio::main]
pub async fn main() {
    dotenv::dotenv().ok();
    pretty_env_logger::init();
    log::info!("Starting panel bot...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {}", err);
            process::exit(1);
        }
    };

    let ctx = match BotContext::connect(config) {
        Ok(ctx) => Arc::new(ctx),
        Err(err) => {
            log::error!("Failed to start: {}", err);
            process::exit(1);
        }
    };

    let bot = teloxide::Bot::from_env();

    log::info!("Panel bot started successfully!");

    run_dispatcher(bot, ctx).await;
}
