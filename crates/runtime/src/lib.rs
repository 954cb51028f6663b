use anyhow::{Context, Result};
use campus_auth::{mailer_from_config, Authenticator};
use campus_config::AppConfig;
use campus_database::initialize_database;
use sqlx::PgPool;
use tracing::info;

pub mod telemetry {
    use anyhow::{Context, Result};
    use campus_config::LogConfig;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    /// Resolve the active filter. `RUST_LOG` wins over the configured one.
    pub fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
        match EnvFilter::try_from_default_env() {
            Ok(filter) => Ok(filter),
            Err(_) => EnvFilter::try_new(&config.filter)
                .with_context(|| format!("invalid log filter `{}`", config.filter)),
        }
    }

    pub fn init_tracing(config: &LogConfig) -> Result<()> {
        let builder = SubscriberBuilder::default().with_env_filter(env_filter(config)?);

        let result = if config.json {
            tracing::subscriber::set_global_default(builder.json().finish())
        } else {
            tracing::subscriber::set_global_default(builder.finish())
        };

        result.map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: PgPool,
    pub authenticator: Authenticator,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to connect to database")?;

        Self::from_pool(db_pool, config)
    }

    /// Wire services around an existing pool without touching the schema.
    pub fn from_pool(db_pool: PgPool, config: &AppConfig) -> Result<Self> {
        let mailer =
            mailer_from_config(&config.mail).context("failed to configure mail provider")?;
        let authenticator = Authenticator::new(db_pool.clone(), &config.auth, mailer);

        info!(
            issuer = %config.auth.issuer,
            require_verified_email = config.auth.require_verified_email,
            "authenticator ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
        })
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
