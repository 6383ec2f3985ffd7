//! Configuration: environment-derived defaults layered with CLI overrides.

use clap::Parser;
use rust_decimal::Decimal;
use std::str::FromStr;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_decimal(name: &str, default: &str) -> Decimal {
    std::env::var(name)
        .ok()
        .and_then(|v| Decimal::from_str(&v).ok())
        .unwrap_or_else(|| Decimal::from_str(default).unwrap())
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct VenueLConfig {
    pub base_url: String,
    pub ws_url: String,
    pub api_key_private_key: Option<String>,
    pub account_index: u64,
    pub api_key_index: u64,
    pub market_index: u64,
    pub base_amount_multiplier: Decimal,
    pub price_multiplier: Decimal,
    pub tick_size: Decimal,
}

#[derive(Debug, Clone)]
pub struct StrategyConfig {
    pub ticker: String,
    pub order_quantity: Decimal,
    pub max_position: Decimal,
    pub long_threshold: Decimal,
    pub short_threshold: Decimal,
    pub threshold_offset: Decimal,
    pub min_samples: usize,
    pub min_signal_interval_secs: f64,
    pub tick_size: Decimal,
    pub hedge_slippage_pct: Decimal,
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub max_position: Decimal,
    pub max_position_imbalance: Decimal,
    pub max_daily_loss: Decimal,
    pub max_latency_ms: u64,
    pub max_error_rate: f64,
    pub min_balance: Decimal,
}

#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub enabled: bool,
    pub bot_token: String,
    pub group_id: String,
    pub account_label: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub venue_l: VenueLConfig,
    pub strategy: StrategyConfig,
    pub risk: RiskConfig,
    pub notifier: NotifierConfig,
    pub log_level: String,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let server = ServerConfig {
            host: env_string("WS_SERVER_HOST", "0.0.0.0"),
            port: env_or("WS_SERVER_PORT", 8765),
        };

        let venue_l = VenueLConfig {
            base_url: env_string("LIGHTER_BASE_URL", "https://mainnet.zklighter.elliot.ai"),
            ws_url: env_string(
                "LIGHTER_WS_URL",
                "wss://mainnet.zklighter.elliot.ai/stream",
            ),
            api_key_private_key: std::env::var("API_KEY_PRIVATE_KEY").ok(),
            account_index: env_or("LIGHTER_ACCOUNT_INDEX", 0),
            api_key_index: env_or("LIGHTER_API_KEY_INDEX", 0),
            market_index: env_or("LIGHTER_MARKET_INDEX", 0),
            base_amount_multiplier: env_decimal("LIGHTER_BASE_AMOUNT_MULTIPLIER", "100000000"),
            price_multiplier: env_decimal("LIGHTER_PRICE_MULTIPLIER", "100000000"),
            tick_size: env_decimal("LIGHTER_TICK_SIZE", "0.1"),
        };

        let max_position = env_decimal("MAX_POSITION", "0.01");

        let strategy = StrategyConfig {
            ticker: env_string("TICKER", "BTC"),
            order_quantity: env_decimal("ORDER_QUANTITY", "0.001"),
            max_position,
            long_threshold: env_decimal("LONG_THRESHOLD", "10"),
            short_threshold: env_decimal("SHORT_THRESHOLD", "10"),
            threshold_offset: env_decimal("THRESHOLD_OFFSET", "10"),
            min_samples: env_or("MIN_SAMPLES", 100),
            min_signal_interval_secs: env_or("MIN_SIGNAL_INTERVAL", 1.0),
            tick_size: env_decimal("TICK_SIZE", "0.1"),
            hedge_slippage_pct: env_decimal("HEDGE_SLIPPAGE_PCT", "0.005"),
        };

        let bot_token = env_string("TELEGRAM_BOT_TOKEN", "");
        let group_id = env_string("TELEGRAM_GROUP_ID", "");

        let risk = RiskConfig {
            // Mirrors the strategy's own max_position: one risk-side derived value.
            max_position,
            max_position_imbalance: env_decimal("MAX_POSITION_IMBALANCE", "0.005"),
            max_daily_loss: env_decimal("MAX_DAILY_LOSS", "100"),
            max_latency_ms: env_or("MAX_LATENCY_MS", 500),
            max_error_rate: env_or("MAX_ERROR_RATE", 0.1),
            min_balance: env_decimal("MIN_BALANCE", "10"),
        };

        let notifier = NotifierConfig {
            enabled: !bot_token.is_empty() && !group_id.is_empty(),
            bot_token,
            group_id,
            account_label: env_string("ACCOUNT_LABEL", "A1"),
        };

        Self {
            server,
            venue_l,
            strategy,
            risk,
            notifier,
            log_level: env_string("LOG_LEVEL", "INFO"),
            log_dir: env_string("LOG_DIR", "logs"),
        }
    }

    /// Apply CLI overrides on top of the environment-derived defaults.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(ticker) = &cli.ticker {
            self.strategy.ticker = ticker.clone();
        }
        if let Some(size) = cli.size {
            self.strategy.order_quantity = size;
        }
        if let Some(max_position) = cli.max_position {
            self.strategy.max_position = max_position;
            self.risk.max_position = max_position;
        }
        if let Some(offset) = cli.threshold_offset {
            self.strategy.threshold_offset = offset;
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(level) = &cli.log_level {
            self.log_level = level.clone();
        }
        self
    }
}

/// Command-line overrides for the arbitrage coordinator.
#[derive(Parser, Debug)]
#[command(name = "arbxbot", about = "Cross-venue arbitrage executor")]
pub struct Cli {
    #[arg(long)]
    pub ticker: Option<String>,

    #[arg(long)]
    pub size: Option<Decimal>,

    #[arg(long = "max-position")]
    pub max_position: Option<Decimal>,

    #[arg(long = "threshold-offset")]
    pub threshold_offset: Option<Decimal>,

    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long = "log-level")]
    pub log_level: Option<String>,
}
