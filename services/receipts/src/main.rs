use anyhow::Result;
use std::sync::Arc;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use receipts::auth::JwtService;
use receipts::config::AppConfig;
use receipts::directory::UserDirectory;
use receipts::hooks::NotificationHooks;
use receipts::notify::{Mailer, SmtpMailer, UnconfiguredMailer};
use receipts::repositories::{ReceiptRepository, UserRepository};
use receipts::routes;
use receipts::schema;
use receipts::state::AppState;
use receipts::storage::ReceiptStorage;
use receipts::workflow::ReceiptWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting receipt service");

    let config = AppConfig::from_env()?;

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    schema::init_db(&pool).await?;
    if let Some(admin) = &config.admin {
        schema::seed_admin(&pool, admin).await?;
    }

    tokio::fs::create_dir_all(&config.storage_root).await?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp)?),
        None => Arc::new(UnconfiguredMailer),
    };

    let users = UserRepository::new(pool.clone());
    let receipts = ReceiptRepository::new(pool.clone());
    let storage = ReceiptStorage::new(&config.storage_root);

    let directory = UserDirectory::new(users.clone(), mailer.clone(), config.base_url.clone());
    let workflow = ReceiptWorkflow::new(receipts.clone(), users, storage).with_hook(Arc::new(
        NotificationHooks::new(
            mailer,
            config.submission_recipient.clone(),
            config.base_url.clone(),
        ),
    ));

    let state = AppState {
        jwt: JwtService::new(&config.jwt_secret, config.token_expiry),
        directory,
        workflow,
        receipts,
    };

    info!("Receipt service initialized successfully");

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Receipt service listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
