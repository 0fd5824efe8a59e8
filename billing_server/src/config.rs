use std::env;

use billing_engine::{
    helpers::NumberingScheme,
    invoice_objects::{FeeConfig, FeeSchedule},
};
use log::*;
use rbg_common::{parse_boolean_flag, Cents};

const DEFAULT_RBG_HOST: &str = "127.0.0.1";
const DEFAULT_RBG_PORT: u16 = 8480;
const DEFAULT_BATCH_LIMIT: i64 = 100;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Declared provider fee schedules and the inclusive tax rate.
    pub fees: FeeConfig,
    /// Prefixes used to mint invoice numbers from the two sequences.
    pub numbering: NumberingScheme,
    /// When false, requests with `regenerate` set are refused at the server boundary.
    pub allow_regenerate: bool,
    /// Upper bound applied to batch requests that do not specify a limit.
    pub default_batch_limit: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RBG_HOST.to_string(),
            port: DEFAULT_RBG_PORT,
            database_url: String::default(),
            fees: FeeConfig::default(),
            numbering: NumberingScheme::default(),
            allow_regenerate: true,
            default_batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16, database_url: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            database_url: database_url.to_string(),
            ..Default::default()
        }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("RBG_HOST").ok().unwrap_or_else(|| {
            info!("RBG_HOST is not set. Using the default.");
            DEFAULT_RBG_HOST.to_string()
        });
        let port = env::var("RBG_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("{s} is not a valid port for RBG_PORT. {e} Using the default instead.");
                    DEFAULT_RBG_PORT
                })
            })
            .unwrap_or_else(|_| {
                info!("RBG_PORT is not set. Using the default.");
                DEFAULT_RBG_PORT
            });
        let database_url = env::var("RBG_DATABASE_URL").unwrap_or_else(|_| {
            warn!("RBG_DATABASE_URL is not set. Using the default.");
            "sqlite://data/rbg_store.db".to_string()
        });
        let allow_regenerate = parse_boolean_flag(env::var("RBG_ALLOW_REGENERATE").ok(), true);
        let default_batch_limit = env::var("RBG_BATCH_LIMIT")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or(DEFAULT_BATCH_LIMIT);

        Self {
            host,
            port,
            database_url,
            fees: fee_config_from_env(),
            numbering: numbering_from_env(),
            allow_regenerate,
            default_batch_limit,
        }
    }
}

/// The built-in provider schedules, with the default schedule and tax rate overridable from the environment.
fn fee_config_from_env() -> FeeConfig {
    let mut fees = FeeConfig::default();
    if let Some(bps) = env::var("RBG_DEFAULT_FEE_BPS").ok().and_then(|s| s.parse::<i64>().ok()) {
        let fixed = env::var("RBG_DEFAULT_FEE_FIXED_CENTS")
            .ok()
            .and_then(|s| s.parse::<i64>().ok())
            .unwrap_or_else(|| fees.default_schedule.fixed_fee.value());
        fees.default_schedule = FeeSchedule::new(bps, Cents::from(fixed));
        info!("Default fee schedule overridden: {bps} bps + {}", fees.default_schedule.fixed_fee);
    }
    if let Some(bps) = env::var("RBG_TAX_RATE_BPS").ok().and_then(|s| s.parse::<i64>().ok()) {
        fees.tax_rate_basis_points = bps;
        info!("Tax rate overridden: {bps} bps");
    }
    fees
}

fn numbering_from_env() -> NumberingScheme {
    let defaults = NumberingScheme::default();
    let customer = env::var("RBG_CUSTOMER_INVOICE_PREFIX").unwrap_or(defaults.customer_prefix);
    let supplier = env::var("RBG_SUPPLIER_INVOICE_PREFIX").unwrap_or(defaults.supplier_prefix);
    NumberingScheme::new(customer, supplier)
}
