use std::fmt;
use std::path::PathBuf;
use tracing::Level;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required environment variable is absent or empty.
    Missing(&'static str),
    /// A variable is present but its value cannot be used.
    Invalid { var: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(var) => {
                write!(f, "required environment variable {} is not set", var)
            }
            Self::Invalid { var, reason } => {
                write!(f, "invalid value for {}: {}", var, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Which Cashfree endpoint set to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Sandbox,
    Production,
}

impl GatewayMode {
    fn parse(s: &str) -> Option<Self> {
        // The gateway docs say "sandbox"; some deployments configure "test".
        match s.to_ascii_lowercase().as_str() {
            "sandbox" | "test" => Some(Self::Sandbox),
            "production" | "prod" | "live" => Some(Self::Production),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Maximum accepted upload size in bytes (10 MiB).
pub const MAX_FILE_SIZE: u32 = 10 * 1024 * 1024;

/// File extensions the intake accepts.
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["pdf", "txt", "docx"];

/// Rate limit: max handled messages per user per window.
pub const RATE_LIMIT_MESSAGES: usize = 10;

/// Rate limit window in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Process-wide settings, loaded once at startup and passed by reference.
///
/// Secrets live only here; they are never logged and never reach user-facing
/// text.
pub struct Config {
    pub telegram_bot_token: String,
    pub bot_username: String,
    pub openai_api_key: String,
    pub cashfree_client_id: String,
    pub cashfree_app_id: String,
    pub cashfree_client_secret: String,
    pub gateway_mode: GatewayMode,
    /// Price per optimization, in whole rupees.
    pub payment_amount: u32,
    /// UPI handle shown for manual payment.
    pub upi_id: String,
    pub environment: Environment,
    pub debug: bool,
    pub log_level: Level,
    /// Directory for the SQLite store and log files.
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through a lookup function. Tests feed a map here
    /// instead of mutating the real environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| -> Result<String, ConfigError> {
            match lookup(var) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(ConfigError::Missing(var)),
            }
        };

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2
            || token_parts[0].parse::<u64>().is_err()
            || token_parts[1].is_empty()
        {
            return Err(ConfigError::Invalid {
                var: "TELEGRAM_BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let openai_api_key = required("OPENAI_API_KEY")?;
        let cashfree_client_id = required("CASHFREE_CLIENT_ID")?;
        let cashfree_app_id = required("CASHFREE_APP_ID")?;
        let cashfree_client_secret = required("CASHFREE_CLIENT_SECRET")?;

        let payment_amount = match lookup("PAYMENT_AMOUNT") {
            Some(v) => {
                let amount = v.trim().parse::<u32>().map_err(|_| ConfigError::Invalid {
                    var: "PAYMENT_AMOUNT",
                    reason: format!("'{}' is not a whole number of rupees", v),
                })?;
                if amount == 0 {
                    return Err(ConfigError::Invalid {
                        var: "PAYMENT_AMOUNT",
                        reason: "amount must be greater than zero".into(),
                    });
                }
                amount
            }
            None => 5,
        };

        let gateway_mode = match lookup("PAYMENT_GATEWAY_MODE") {
            Some(v) => GatewayMode::parse(&v).ok_or_else(|| ConfigError::Invalid {
                var: "PAYMENT_GATEWAY_MODE",
                reason: format!("'{}' (expected sandbox or production)", v),
            })?,
            None => GatewayMode::Sandbox,
        };

        let environment = match lookup("ENVIRONMENT") {
            Some(v) => Environment::parse(&v).ok_or_else(|| ConfigError::Invalid {
                var: "ENVIRONMENT",
                reason: format!("'{}' (expected development or production)", v),
            })?,
            None => Environment::Development,
        };

        let debug = match lookup("DEBUG") {
            Some(v) => match v.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" | "" => false,
                other => {
                    return Err(ConfigError::Invalid {
                        var: "DEBUG",
                        reason: format!("'{}' is not a boolean", other),
                    });
                }
            },
            None => false,
        };

        let mut log_level = match lookup("LOG_LEVEL") {
            Some(v) => v
                .trim()
                .parse::<Level>()
                .map_err(|_| ConfigError::Invalid {
                    var: "LOG_LEVEL",
                    reason: format!("'{}' (expected ERROR, WARN, INFO, DEBUG or TRACE)", v),
                })?,
            None => Level::INFO,
        };
        // DEBUG=true never lowers verbosity below debug.
        if debug && log_level < Level::DEBUG {
            log_level = Level::DEBUG;
        }

        let upi_id = lookup("UPI_ID").unwrap_or_else(|| "suryaresume@paytm".to_string());
        let bot_username =
            lookup("BOT_USERNAME").unwrap_or_else(|| "suryaatsresumebot".to_string());
        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            telegram_bot_token,
            bot_username,
            openai_api_key,
            cashfree_client_id,
            cashfree_app_id,
            cashfree_client_secret,
            gateway_mode,
            payment_amount,
            upi_id,
            environment,
            debug,
            log_level,
            data_dir,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        let mut env = HashMap::new();
        env.insert(
            "TELEGRAM_BOT_TOKEN",
            "123456789:ABCdefGHIjklMNOpqrsTUVwxyz".to_string(),
        );
        env.insert("OPENAI_API_KEY", "sk-test".to_string());
        env.insert("CASHFREE_CLIENT_ID", "cf-client".to_string());
        env.insert("CASHFREE_APP_ID", "cf-app".to_string());
        env.insert("CASHFREE_CLIENT_SECRET", "cf-secret".to_string());
        env
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|var| env.get(var).cloned())
    }

    fn assert_err(result: Result<Config, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = load(&base_env()).expect("should load");
        assert_eq!(config.payment_amount, 5);
        assert_eq!(config.gateway_mode, GatewayMode::Sandbox);
        assert_eq!(config.environment, Environment::Development);
        assert!(!config.debug);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.upi_id, "suryaresume@paytm");
        assert_eq!(config.bot_username, "suryaatsresumebot");
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert!(!config.is_production());
    }

    #[test]
    fn test_values_surface_unmodified() {
        let mut env = base_env();
        env.insert("PAYMENT_AMOUNT", "49".to_string());
        env.insert("UPI_ID", "resumes@upi".to_string());
        env.insert("BOT_USERNAME", "my_resume_bot".to_string());
        env.insert("DATA_DIR", "/var/lib/atsbot".to_string());
        let config = load(&env).expect("should load");
        assert_eq!(config.telegram_bot_token, env["TELEGRAM_BOT_TOKEN"]);
        assert_eq!(config.openai_api_key, "sk-test");
        assert_eq!(config.cashfree_client_secret, "cf-secret");
        assert_eq!(config.payment_amount, 49);
        assert_eq!(config.upi_id, "resumes@upi");
        assert_eq!(config.bot_username, "my_resume_bot");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/atsbot"));
    }

    #[test]
    fn test_each_required_var_is_checked() {
        for var in [
            "TELEGRAM_BOT_TOKEN",
            "OPENAI_API_KEY",
            "CASHFREE_CLIENT_ID",
            "CASHFREE_APP_ID",
            "CASHFREE_CLIENT_SECRET",
        ] {
            let mut env = base_env();
            env.remove(var);
            let err = assert_err(load(&env));
            match err {
                ConfigError::Missing(missing) => assert_eq!(missing, var),
                other => panic!("expected Missing({}), got {}", var, other),
            }
        }
    }

    #[test]
    fn test_empty_secret_counts_as_missing() {
        let mut env = base_env();
        env.insert("OPENAI_API_KEY", "   ".to_string());
        let err = assert_err(load(&env));
        assert!(matches!(err, ConfigError::Missing("OPENAI_API_KEY")));
    }

    #[test]
    fn test_invalid_token_format() {
        for bad in ["no_colon_here", "notanumber:secret", "123456789:"] {
            let mut env = base_env();
            env.insert("TELEGRAM_BOT_TOKEN", bad.to_string());
            let err = assert_err(load(&env));
            assert!(matches!(
                err,
                ConfigError::Invalid { var: "TELEGRAM_BOT_TOKEN", .. }
            ));
        }
    }

    #[test]
    fn test_invalid_payment_amount() {
        for bad in ["five", "4.99", "-2", "0"] {
            let mut env = base_env();
            env.insert("PAYMENT_AMOUNT", bad.to_string());
            let err = assert_err(load(&env));
            assert!(matches!(
                err,
                ConfigError::Invalid { var: "PAYMENT_AMOUNT", .. }
            ));
        }
    }

    #[test]
    fn test_gateway_mode_parsing() {
        let mut env = base_env();
        env.insert("PAYMENT_GATEWAY_MODE", "production".to_string());
        assert_eq!(load(&env).unwrap().gateway_mode, GatewayMode::Production);

        env.insert("PAYMENT_GATEWAY_MODE", "test".to_string());
        assert_eq!(load(&env).unwrap().gateway_mode, GatewayMode::Sandbox);

        env.insert("PAYMENT_GATEWAY_MODE", "carrier-pigeon".to_string());
        let err = assert_err(load(&env));
        assert!(matches!(
            err,
            ConfigError::Invalid { var: "PAYMENT_GATEWAY_MODE", .. }
        ));
    }

    #[test]
    fn test_environment_parsing() {
        let mut env = base_env();
        env.insert("ENVIRONMENT", "production".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert!(config.is_production());

        env.insert("ENVIRONMENT", "staging".to_string());
        assert!(matches!(
            assert_err(load(&env)),
            ConfigError::Invalid { var: "ENVIRONMENT", .. }
        ));
    }

    #[test]
    fn test_debug_flag_parsing() {
        let mut env = base_env();
        env.insert("DEBUG", "True".to_string());
        let config = load(&env).unwrap();
        assert!(config.debug);
        // DEBUG raises the default INFO level
        assert_eq!(config.log_level, Level::DEBUG);

        env.insert("DEBUG", "false".to_string());
        assert!(!load(&env).unwrap().debug);

        env.insert("DEBUG", "maybe".to_string());
        assert!(matches!(
            assert_err(load(&env)),
            ConfigError::Invalid { var: "DEBUG", .. }
        ));
    }

    #[test]
    fn test_log_level_parsing() {
        let mut env = base_env();
        env.insert("LOG_LEVEL", "warn".to_string());
        assert_eq!(load(&env).unwrap().log_level, Level::WARN);

        // explicit TRACE stays TRACE even with DEBUG=true
        env.insert("DEBUG", "true".to_string());
        env.insert("LOG_LEVEL", "TRACE".to_string());
        assert_eq!(load(&env).unwrap().log_level, Level::TRACE);

        env.insert("LOG_LEVEL", "loud".to_string());
        assert!(matches!(
            assert_err(load(&env)),
            ConfigError::Invalid { var: "LOG_LEVEL", .. }
        ));
    }
}
