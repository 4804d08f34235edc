use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tokio_cron_scheduler::Job;
use url::Url;
use validator::Validate;

use crate::models::ReconcilePolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scraper: ScraperConfig,
    pub reconcile: ReconcileConfig,
    pub notifications: NotificationsConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Product pages live at `<base_url>/<identifier>`.
    pub base_url: String,
    pub browser_binary_path: Option<String>,
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Element whose presence means the page finished rendering.
    pub content_marker: String,
    pub selectors: SelectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    pub price: String,
    pub name: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    pub policy: ReconcilePolicy,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Smtp,
    Mailjet,
    /// Write messages to the log instead of sending them.
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NotificationsConfig {
    pub transport: TransportKind,
    #[validate(length(min = 1))]
    pub subject: String,
    #[validate(email)]
    pub from_email: String,
    pub from_name: String,
    pub currency_symbol: String,
    pub smtp: SmtpConfig,
    pub mailjet: MailjetConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailjetConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_base: String,
    /// Upper bound on one send, connect included.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first).
    pub cron: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// Daily rolling log files are written here when set.
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "sqlite://data/pricewatch.db".to_string(),
                max_connections: 5,
            },
            scraper: ScraperConfig {
                base_url: "https://django-react-ecommerce.vercel.app/products".to_string(),
                browser_binary_path: None,
                timeout_secs: 10,
                concurrency: 2,
                headless: true,
                window_width: 1366,
                window_height: 768,
                content_marker: ".product-details-content > h3".to_string(),
                selectors: SelectorConfig {
                    price: "div.product-details-content h3".to_string(),
                    name: "div.product-details-content h2".to_string(),
                    image: "div.product-dec-right img".to_string(),
                },
            },
            reconcile: ReconcileConfig {
                policy: ReconcilePolicy::Always,
            },
            notifications: NotificationsConfig {
                transport: TransportKind::Log,
                subject: "Important: Current prices".to_string(),
                from_email: "alerts@pricewatch.local".to_string(),
                from_name: "Price Watcher".to_string(),
                currency_symbol: "$".to_string(),
                smtp: SmtpConfig {
                    host: "localhost".to_string(),
                    port: 587,
                    username: None,
                    password: None,
                    use_tls: true,
                },
                mailjet: MailjetConfig {
                    api_key: None,
                    api_secret: None,
                    api_base: "https://api.mailjet.com".to_string(),
                    timeout_secs: 30,
                },
            },
            scheduler: SchedulerConfig {
                enabled: false,
                cron: "0 0 */6 * * *".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                directory: None,
            },
            metrics: MetricsConfig {
                enabled: false,
                port: 9001,
            },
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MailjetConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, ignored by git
            .add_source(File::with_name("config/local").required(false))
            // e.g. PRICEWATCH__NOTIFICATIONS__MAILJET__API_KEY
            .add_source(Environment::with_prefix("PRICEWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;

        if config.scraper.browser_binary_path.is_none() {
            config.scraper.browser_binary_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if Url::parse(&self.scraper.base_url).is_err() {
            return Err(ConfigError::Message("Invalid scraper base_url format".into()));
        }

        if self.scraper.concurrency == 0 {
            return Err(ConfigError::Message("Scraper concurrency must be greater than 0".into()));
        }

        if self.scraper.timeout_secs == 0 {
            return Err(ConfigError::Message("Scraper timeout_secs must be greater than 0".into()));
        }

        let selectors = [
            ("content_marker", &self.scraper.content_marker),
            ("selectors.price", &self.scraper.selectors.price),
            ("selectors.name", &self.scraper.selectors.name),
            ("selectors.image", &self.scraper.selectors.image),
        ];
        for (field, selector) in selectors {
            if selector.trim().is_empty() || scraper::Selector::parse(selector).is_err() {
                return Err(ConfigError::Message(format!(
                    "Scraper {} is not a valid CSS selector",
                    field
                )));
            }
        }

        self.notifications
            .validate()
            .map_err(|e| ConfigError::Message(format!("Invalid notifications config: {}", e)))?;

        match self.notifications.transport {
            TransportKind::Mailjet => {
                let mailjet = &self.notifications.mailjet;
                if mailjet.api_key.is_none() || mailjet.api_secret.is_none() {
                    return Err(ConfigError::Message(
                        "Mailjet transport requires api_key and api_secret".into(),
                    ));
                }
                if mailjet.timeout_secs == 0 {
                    return Err(ConfigError::Message("Mailjet timeout_secs must be greater than 0".into()));
                }
            }
            TransportKind::Smtp => {
                if self.notifications.smtp.host.is_empty() || self.notifications.smtp.port == 0 {
                    return Err(ConfigError::Message("SMTP host and port must be set".into()));
                }
            }
            TransportKind::Log => {}
        }

        if self.scheduler.enabled && !self.is_valid_cron(&self.scheduler.cron) {
            return Err(ConfigError::Message("Invalid cron expression in scheduler.cron".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }

    /// Parsed exactly as the scheduler will parse it when the job is added.
    fn is_valid_cron(&self, cron_expr: &str) -> bool {
        Job::new_async(cron_expr, |_uuid, _lock| Box::pin(async {})).is_ok()
    }
}
