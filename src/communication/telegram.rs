use crate::communication::error_handler::create_error_response;
use crate::configuration::Context;
use crate::core::service_manager::{Error as ServiceManagerError, Service};
use crate::database::DatabaseService;
use crate::verification::{
    CodeVerification, ContactPayload, ContactVerification, TelegramIdentity, VerificationService,
    VerificationStatus,
};
use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{ButtonRequest, Contact, KeyboardButton, KeyboardMarkup};
use tracing::error;

const WELCOME_MESSAGE: &str = "Welcome to the Phone Verification Bot! 👋\n\n\
    To verify your phone number, please share your contact using the button below.";

const HELP_MESSAGE: &str = "🤖 Phone Verification Bot Help\n\n\
    This bot verifies your phone number for the website.\n\n\
    How to use:\n\
    1. Start the verification process on the website\n\
    2. Click the 'Verify via Telegram' button\n\
    3. This bot will automatically verify your phone number\n\n\
    If you have any issues, please contact support.";

const SUCCESS_MESSAGE: &str = "✅ Your phone number has been verified successfully!\n\n\
    You can now return to the website to continue.";

pub struct TelegramService {
    bot: Bot,
    verification: VerificationService,
}

pub struct Response {
    pub text: String,
    pub request_contact: bool,
}

impl Response {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            request_contact: false,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Start(Option<&'a str>),
    Help,
    Status,
    Other,
}

fn parse_command(text: &str) -> Command<'_> {
    let mut parts = text.split_whitespace();
    // Commands in group chats arrive as /command@botname
    let command = parts
        .next()
        .map(|cmd| cmd.split('@').next().unwrap_or(cmd));
    match command {
        Some("/start") => Command::Start(parts.next()),
        Some("/help") => Command::Help,
        Some("/status") => Command::Status,
        _ => Command::Other,
    }
}

#[async_trait]
impl Service for TelegramService {
    type Context = Context;

    async fn new(_context: Context) -> Self {
        // Credentials are checked at startup before any service is spawned
        let db = DatabaseService::new().unwrap();
        let bot = Bot::from_env();

        Self {
            bot,
            verification: VerificationService::new(db),
        }
    }

    async fn run(self) -> Result<(), ServiceManagerError> {
        let verification = Arc::new(self.verification);
        teloxide::repl(self.bot, move |bot: Bot, msg: Message| {
            let verification = Arc::clone(&verification);
            async move {
                tokio::spawn(Self::handle_message(bot, msg, verification));
                respond(())
            }
        })
        .await;
        Ok(())
    }
}

impl TelegramService {
    async fn handle_message(
        bot: Bot,
        msg: Message,
        verification: Arc<VerificationService>,
    ) -> ResponseResult<()> {
        let chat_id = msg.chat.id;
        let Some(user) = msg.from() else {
            return Ok(());
        };
        let identity = TelegramIdentity {
            telegram_id: user.id.0 as i64,
            username: user.username.clone(),
        };

        let response = if let Some(text) = msg.text() {
            match parse_command(text) {
                Command::Start(Some(code)) => {
                    Self::verify_code(&verification, code, &identity).await
                }
                Command::Start(None) => Response {
                    text: WELCOME_MESSAGE.to_string(),
                    request_contact: true,
                },
                Command::Help => Response::text(HELP_MESSAGE),
                Command::Status => Self::check_status(&verification, &identity).await,
                Command::Other => return Ok(()),
            }
        } else if let Some(contact) = msg.contact() {
            Self::verify_contact(&verification, contact, &identity).await
        } else {
            return Ok(());
        };

        let request = bot.send_message(chat_id, response.text);
        if response.request_contact {
            request.reply_markup(contact_keyboard()).await?;
        } else {
            request.await?;
        }
        Ok(())
    }

    async fn verify_code(
        verification: &VerificationService,
        code: &str,
        identity: &TelegramIdentity,
    ) -> Response {
        match verification.verify_code(code, identity).await {
            Ok(outcome) => Response::text(code_verification_text(&outcome)),
            Err(e) => {
                error!("Error during code verification: {}", e);
                create_error_response(&e)
            }
        }
    }

    async fn verify_contact(
        verification: &VerificationService,
        contact: &Contact,
        identity: &TelegramIdentity,
    ) -> Response {
        let payload = ContactPayload {
            phone_number: contact.phone_number.clone(),
            user_id: contact.user_id.map(|id| id.0 as i64),
        };
        match verification.verify_contact(&payload, identity).await {
            Ok(outcome) => Response::text(contact_verification_text(&outcome)),
            Err(e) => {
                error!("Error while processing contact: {}", e);
                create_error_response(&e)
            }
        }
    }

    async fn check_status(
        verification: &VerificationService,
        identity: &TelegramIdentity,
    ) -> Response {
        match verification.status(identity).await {
            Ok(outcome) => Response::text(status_text(&outcome)),
            Err(e) => {
                error!("Error while checking status: {}", e);
                create_error_response(&e)
            }
        }
    }
}

fn contact_keyboard() -> KeyboardMarkup {
    let button = KeyboardButton::new("Share Phone Number").request(ButtonRequest::Contact);
    KeyboardMarkup::new(vec![vec![button]])
        .resize_keyboard(true)
        .one_time_keyboard(true)
}

fn code_verification_text(outcome: &CodeVerification) -> &'static str {
    match outcome {
        CodeVerification::Verified => SUCCESS_MESSAGE,
        CodeVerification::UnknownCode => {
            "Invalid verification code. Please try again from the website."
        }
        CodeVerification::IncompleteRecord => {
            "Invalid verification data. Please try again from the website."
        }
        CodeVerification::UnknownUser => "User not found. Please try again from the website.",
    }
}

fn contact_verification_text(outcome: &ContactVerification) -> &'static str {
    match outcome {
        ContactVerification::Verified { .. } => SUCCESS_MESSAGE,
        ContactVerification::NotOwnContact => "Please share your own contact information.",
        ContactVerification::MissingPhone => "No phone number found in contact.",
        ContactVerification::NoPendingVerification => {
            "No pending verification found for this phone number. \
             Please start the verification process from the website first."
        }
    }
}

fn status_text(outcome: &VerificationStatus) -> &'static str {
    match outcome {
        VerificationStatus::Verified => {
            "✅ Your phone number is already verified!\n\n\
             You can return to the website to continue."
        }
        VerificationStatus::NotVerified => {
            "Your phone number is not yet verified.\n\n\
             Please start the verification process from the website first."
        }
    }
}
