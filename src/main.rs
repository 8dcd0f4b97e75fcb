//! dinner-resilience
//!
//! Hosts the resilience core behind a small axum surface.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ TraceLayer ─▶ rate_limit_middleware ─▶ /health, /health/rate-limits
//!                                        │
//!                                 RateLimiterStore ◀── RateLimitSweeper (every 5 min)
//!
//!     CircuitBreakerRegistry: payments, database, llm (from config)
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use dinner_resilience::config::{load_config, validate_config, AppConfig, ConfigError};
use dinner_resilience::http::{AppState, HttpServer};
use dinner_resilience::lifecycle::Shutdown;
use dinner_resilience::observability::{logging, metrics};
use dinner_resilience::resilience::CircuitBreakerRegistry;
use dinner_resilience::security::{RateLimitSweeper, RateLimiter, RateLimiterStore};

#[derive(Parser)]
#[command(name = "dinner-resilience")]
#[command(about = "Retry, circuit breaking and rate limiting for the dinner service", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => {
            let config = AppConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            config
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!(
        config = ?cli.config,
        bind_address = %config.listener.bind_address,
        "dinner-resilience v0.1.0 starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?);
    }

    let retry = config.retry.to_retry_config();
    tracing::info!(
        max_attempts = retry.max_attempts,
        base_delay = ?retry.base_delay,
        max_delay = ?retry.max_delay,
        "Retry policy loaded"
    );

    let breakers = Arc::new(CircuitBreakerRegistry::default());
    for (name, settings) in config.breakers.iter() {
        breakers.register(name, settings.to_breaker_config());
    }
    tracing::info!(breakers = ?breakers.names(), "Circuit breakers registered");

    let shutdown = Shutdown::new();
    let store = Arc::new(RateLimiterStore::new());

    let limiter = if config.rate_limit.enabled {
        let policy = config
            .rate_limit
            .default_policy()
            .ok_or_else(|| format!("unknown rate limit tier '{}'", config.rate_limit.default_tier))?;
        tracing::info!(
            tier = %config.rate_limit.default_tier,
            requests = policy.requests,
            window = ?policy.window,
            "Rate limiting enabled"
        );

        let sweeper = RateLimitSweeper::new(store.clone(), config.rate_limit.sweep_interval());
        tokio::spawn(sweeper.run(shutdown.subscribe()));

        Some(Arc::new(RateLimiter::new(
            config.rate_limit.default_tier.clone(),
            policy,
            store.clone(),
        )))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(AppState {
        breakers,
        limiter_store: store,
        limiter,
        retry,
    });
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.trigger();

    serving.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
