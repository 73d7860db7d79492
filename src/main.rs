use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use postbook::config::{Cli, Command, Config};
use postbook::media::FsImageStore;
use postbook::state::AppState;
use postbook::store::AccountStore;
use postbook::{db, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure the image store root exists
    let media_root = config.media_path();
    std::fs::create_dir_all(&media_root)?;

    // Initialize database
    let pool = db::create_pool(&config.db_path())?;
    db::run_migrations(&pool)?;

    if let Some(Command::CreateAdmin { email, password }) = &cli.command {
        let account = AccountStore::new(pool, config.auth.bcrypt_cost)
            .register_admin(email, password)?;
        tracing::info!("Created admin account {} ({})", account.id, account.email);
        return Ok(());
    }

    let state = AppState {
        db: pool,
        config: config.clone(),
        images: Arc::new(FsImageStore::new(media_root)),
    };

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
