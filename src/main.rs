use dotenvy::dotenv;
use phone_verify_bot::communication::telegram::TelegramService;
use phone_verify_bot::configuration::Context;
use phone_verify_bot::core::ServiceManager;
use phone_verify_bot::database::DatabaseService;
use phone_verify_bot::AppError;
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    let context = Context::new("config.json").map_err(|e| AppError::ConfigError(e.to_string()))?;

    let log_level = Level::from_str(&context.config.log_level).unwrap_or(Level::INFO);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::new(log_level.to_string()))
        .init();

    // Fail fast before serving when store credentials or the bot token are missing
    DatabaseService::new().map_err(|e| AppError::ConfigError(e.to_string()))?;
    if std::env::var("TELOXIDE_TOKEN").is_err() {
        return Err(AppError::ConfigError(
            "TELOXIDE_TOKEN is not set".to_string(),
        ));
    }
    tracing::info!("Starting Phone Verification Bot");

    let mut service_manager = ServiceManager::new(context);
    service_manager.spawn::<TelegramService>();

    service_manager
        .wait()
        .await
        .map_err(|_| AppError::ServiceError)
}
