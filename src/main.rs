use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use tracing::info;

use bitewise::api::stats::{self, DateRange};
use bitewise::chat::CacheKey;
use bitewise::routes::guards::{self, GuardDecision};
use bitewise::routes::oauth_callback;
use bitewise::service::chat_service::CONVERSATION_PAGE_SIZE;
use bitewise::{ApiClient, AuthState, ChatService, ClientConfig, FileStore, SessionController, TokenStore};

#[derive(Parser)]
#[command(name = "bitewise", about = "BiteWise nutrition tracker client")]
struct Cli {
    /// Backend base URL (overrides BITEWISE_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session state file (overrides BITEWISE_STATE_FILE)
    #[arg(long, global = true)]
    state_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BITEWISE_PASSWORD")]
        password: String,
    },
    /// Sign out locally and on the server
    Logout,
    /// Show the current session
    Status,
    /// Complete an identity-provider sign-in from its callback URL
    Oauth { callback_url: String },
    /// List conversations
    Conversations {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Show the messages of a conversation
    Messages { conversation_id: String },
    /// Ask the nutrition assistant
    Chat {
        message: String,
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Nutrition statistics
    Stats {
        /// Days covered by the calorie and macronutrient reports
        #[arg(long, default_value_t = 7)]
        days: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bitewise=info".into()),
        )
        .init();

    let cli = Cli::parse();

    // ── Configuration ─────────────────────────────────────────────────────────
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(path) = cli.state_file {
        config.state_file = path;
    }

    // ── Dependency wiring ─────────────────────────────────────────────────────
    let store = Arc::new(FileStore::open(&config.state_file));
    let tokens = TokenStore::new(store);
    let api = ApiClient::new(config, tokens)?;
    let session = SessionController::new(api.clone());
    session.initialize();
    let chat = ChatService::new(api.clone());

    match cli.command {
        Command::Login { email, password } => {
            let user = session
                .sign_in(&email, &password)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Signed in as {} ({})", user.username, user.email);
        }
        Command::Logout => {
            let destination = session.logout().await;
            chat.reset();
            println!("Signed out. Next: {destination}");
        }
        Command::Status => match session.state() {
            AuthState::Authenticated(user) => {
                let expiry = api.tokens().expires_at_ms().unwrap_or_default();
                println!("Signed in as user {} (token expires at {expiry} ms)", user.id);
            }
            _ => println!("Not signed in"),
        },
        Command::Oauth { callback_url } => {
            let (callback, cleaned) = oauth_callback::consume(&callback_url)?;
            let success = callback
                .context("URL carries no sign-in result")?
                .into_result()
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            let user = session.complete_oauth(&success)?;
            info!("OAuth sign-in via {:?}", success.provider);
            println!("Signed in as user {}. Continue at {cleaned}", user.id);
        }
        command => {
            if let GuardDecision::Redirect { to, .. } = guards::protected(&session, "/chat") {
                anyhow::bail!("Not signed in. Run `bitewise login` first ({to}).");
            }
            let outcome = run_protected(command, &chat, &api).await;
            if let Err(e) = &outcome {
                session.observe_error(e);
            }
            outcome.map_err(|e| anyhow::anyhow!(e.user_message()))?;
        }
    }

    Ok(())
}

async fn run_protected(
    command: Command,
    chat: &ChatService,
    api: &ApiClient,
) -> Result<(), bitewise::AppError> {
    match command {
        Command::Conversations { page } => {
            let listing = chat.conversations(page).await?;
            for conversation in &listing.conversations {
                println!(
                    "{:>6}  {}  ({} unread)",
                    conversation.id,
                    conversation.title.as_deref().unwrap_or("Untitled"),
                    conversation.unread_count
                );
            }
            println!(
                "page {page} of {}",
                listing.total_count.div_ceil(u64::from(CONVERSATION_PAGE_SIZE)).max(1)
            );
        }
        Command::Messages { conversation_id } => {
            for message in chat.messages(&conversation_id).await?.messages {
                let who = if message.is_user_message { "you" } else { "assistant" };
                println!("[{}] {who}: {}", message.status, message.content);
            }
        }
        Command::Chat { message, conversation } => {
            let response = chat.send_message(&message, conversation.as_deref()).await;
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    let key = CacheKey::for_conversation(conversation.as_deref());
                    let failed = chat.cache().messages(&key).map_or(0, |l| l.messages.len());
                    info!("Send failed; {failed} message(s) kept locally for retry");
                    return Err(e);
                }
            };
            if let Some(id) = &response.conversation_id {
                println!("(conversation {id})");
            }
            println!("{}", response.ai_message.content);
        }
        Command::Stats { days } => {
            let quick = stats::quick_stats(api).await?;
            println!(
                "Today: {:.0} kcal{}, {} meal(s)",
                quick.calories_today,
                quick.calorie_goal.map(|g| format!(" of {g:.0}")).unwrap_or_default(),
                quick.meals_logged
            );
            let end = Utc::now().date_naive();
            let range = DateRange::new(end - Duration::days(days.max(1) - 1), end)?;
            let calories = stats::calories(api, range).await?;
            let macros = stats::macronutrients(api, range).await?;
            println!(
                "Last {days} day(s): avg {:.0} kcal/day, protein {:.0} g, carbs {:.0} g, fats {:.0} g",
                calories.average_daily_calories, macros.protein_g, macros.carbs_g, macros.fats_g
            );
        }
        Command::Login { .. } | Command::Logout | Command::Status | Command::Oauth { .. } => {}
    }
    Ok(())
}
