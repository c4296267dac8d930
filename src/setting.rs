use crate::Result;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

/// shortest accepted jwt signing secret
pub const AUTH_SECRET_MIN_LEN: usize = 16;

pub const CARGO_PKG_VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// number of threads config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Thread {
    /// number of http server threads
    pub http: usize,
}

/// network config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Network {
    /// server bind host
    pub host: String,
    /// server bind port
    pub port: u16,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

/// checkout gateway type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gateway {
    #[default]
    Stripe,
    /// in-process sessions nobody can pay, development only
    Memory,
}

/// Stripe setting
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Stripe {
    /// api base url
    pub url: String,
    /// sk_live_... or sk_test_...
    pub secret_key: String,
}

impl Default for Stripe {
    fn default() -> Self {
        Self {
            url: checkout_client::stripe::DEFAULT_URL.to_owned(),
            secret_key: "".to_owned(),
        }
    }
}

/// front-end pages the payment callbacks redirect to
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Frontend {
    pub url: String,
    pub success_path: String,
    pub failed_path: String,
}

impl Default for Frontend {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_owned(),
            success_path: "/donation-success".to_owned(),
            failed_path: "/donation-failed".to_owned(),
        }
    }
}

impl Frontend {
    pub fn success(&self, donation_id: &str) -> String {
        format!(
            "{}{}?id={}",
            self.url.trim_end_matches('/'),
            self.success_path,
            donation_id
        )
    }

    pub fn failed(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), self.failed_path)
    }
}

/// donation checkout config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Checkout {
    /// display currency, ISO code in lower case
    pub currency: String,
    /// minor units per whole unit of the currency
    pub minor_unit: u64,
    pub min_amount: i64,
    pub max_amount: i64,
    /// accepted campaigns, any non-empty name if empty
    pub campaigns: Vec<String>,
    /// seconds after which a pending donation is considered abandoned
    pub abandon_after: u64,
    /// seconds between abandoned donation sweeps
    pub sweep_interval: u64,
    /// seconds to wait for a gateway call
    pub gateway_timeout: u64,
}

impl Default for Checkout {
    fn default() -> Self {
        Self {
            currency: "inr".to_owned(),
            minor_unit: 100,
            min_amount: 1,
            max_amount: 1_000_000,
            campaigns: [
                "Disaster Relief",
                "Medical Aid Program",
                "Child Education Support",
                "Women Empowerment Program",
                "Food Distribution Drive",
                "Orphan Care Program",
                "Old Age Home Support",
                "Tree Plantation Drive",
                "Environmental Protection",
                "NGO Welfare & Operations",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            abandon_after: 30 * 60,
            sweep_interval: 10 * 60,
            gateway_timeout: 10,
        }
    }
}

impl Checkout {
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

/// auth config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Auth {
    /// jwt signing secret, required
    pub secret: String,

    /// jwt expiry in seconds
    pub token_expiry: usize,

    pub bcrypt_cost: u32,

    /// emails registered with the admin role
    pub admins: Vec<String>,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            secret: "".to_owned(),
            token_expiry: 2 * 60 * 60,
            bcrypt_cost: 10,
            admins: vec![],
        }
    }
}

impl Auth {
    pub fn is_admin(&self, email: &str) -> bool {
        self.admins.iter().any(|a| a.eq_ignore_ascii_case(email))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Setting {
    /// database url
    /// https://www.sea-ql.org/SeaORM/docs/install-and-config/connection/
    pub db_url: String,

    /// the public url of this server, used in checkout callbacks
    pub site: Option<String>,

    pub frontend: Frontend,

    pub thread: Thread,
    pub network: Network,

    pub gateway: Gateway,
    pub stripe: Option<Stripe>,

    pub checkout: Checkout,
    pub auth: Auth,
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            db_url: "sqlite://givebox.sqlite?mode=rwc".to_string(),
            site: None,
            frontend: Default::default(),
            thread: Default::default(),
            network: Default::default(),
            gateway: Default::default(),
            stripe: None,
            checkout: Default::default(),
            auth: Default::default(),
        }
    }
}

impl Setting {
    pub fn site(&self) -> String {
        self.site
            .clone()
            .map(|s| s.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| format!("http://{}:{}", self.network.host, self.network.port))
    }

    /// read config from file and env
    pub fn read<P: AsRef<Path>>(file: P, env_prefix: Option<String>) -> Result<Self> {
        let builder = Config::builder();
        let mut config = builder
            // Use serde default feature, ignore the following code
            // // use defaults
            // .add_source(Config::try_from(&Self::default())?)
            // override with file contents
            .add_source(File::from(file.as_ref()));
        if let Some(prefix) = env_prefix {
            config = config.add_source(Self::env_source(&prefix));
        }

        let config = config.build()?;
        let mut setting: Setting = config.try_deserialize()?;
        setting.validate()?;
        Ok(setting)
    }

    fn env_source(prefix: &str) -> Environment {
        Environment::with_prefix(prefix)
            .try_parsing(true)
            .prefix_separator("_")
            .separator("__")
            .list_separator(" ")
            .with_list_parse_key("checkout.campaigns")
            .with_list_parse_key("auth.admins")
    }

    /// read config from env
    pub fn from_env(env_prefix: String) -> Result<Self> {
        let mut config = Config::builder();
        config = config.add_source(Self::env_source(&env_prefix));

        let config = config.build()?;
        let mut setting: Setting = config.try_deserialize()?;
        setting.validate()?;
        Ok(setting)
    }

    /// config from str
    pub fn from_str(s: &str, format: FileFormat) -> Result<Self> {
        let builder = Config::builder();
        let config = builder.add_source(File::from_str(s, format)).build()?;
        let mut setting: Setting = config.try_deserialize()?;
        setting.validate()?;
        Ok(setting)
    }

    pub fn validate(&mut self) -> Result<()> {
        if self.auth.secret.len() < AUTH_SECRET_MIN_LEN {
            return Err(crate::Error::Message(format!(
                "auth.secret must be at least {} characters",
                AUTH_SECRET_MIN_LEN
            )));
        }
        let c = &self.checkout;
        if c.minor_unit == 0 {
            return Err(crate::Error::Str("checkout.minor_unit must be positive"));
        }
        if c.min_amount < 1 || c.max_amount < c.min_amount {
            return Err(crate::Error::Str("invalid checkout amount range"));
        }
        if c.sweep_interval == 0 {
            return Err(crate::Error::Str("checkout.sweep_interval must be positive"));
        }
        if self.gateway == Gateway::Stripe
            && self
                .stripe
                .as_ref()
                .map(|s| s.secret_key.is_empty())
                .unwrap_or(true)
        {
            return Err(crate::Error::Str("Need config stripe.secret_key"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use config::FileFormat;
    use std::fs;
    use tempfile::Builder;

    #[test]
    fn der() -> Result<()> {
        let json = r#"{
            "gateway": "stripe",
            "stripe": {"secret_key": "sk_test_1"},
            "auth": {"secret": "0123456789abcdef"},
            "network": {"port": 1},
            "thread": {"http": 1}
        }"#;

        let mut def = Setting::default();
        def.network.port = 1;
        def.thread.http = 1;
        def.auth.secret = "0123456789abcdef".to_owned();
        def.stripe = Some(Stripe {
            secret_key: "sk_test_1".to_owned(),
            ..Default::default()
        });

        let s2 = serde_json::from_str::<Setting>(json)?;
        let s1: Setting = Setting::from_str(json, FileFormat::Json)?;

        assert_eq!(def, s1);
        assert_eq!(def, s2);

        // stripe without key
        let res = Setting::from_str(
            r#"{"gateway": "stripe", "auth": {"secret": "0123456789abcdef"}}"#,
            FileFormat::Json,
        );
        assert!(res.is_err());
        Ok(())
    }

    #[test]
    fn read() -> Result<()> {
        let setting = Setting::default();
        assert_eq!(setting.network.host, "127.0.0.1");
        assert_eq!(setting.checkout.abandon_after, 1800);
        assert_eq!(setting.site(), "http://127.0.0.1:5000");

        let file = Builder::new()
            .prefix("givebox-config-test-read")
            .suffix(".toml")
            .rand_bytes(0)
            .tempfile()?;

        fs::write(
            &file,
            r#"
        site = "https://give.example.org/"
        gateway = "memory"
        [auth]
        secret = "0123456789abcdef"
        [network]
        host = "127.0.0.2"
        [checkout]
        currency = "usd"
        "#,
        )?;
        let setting = Setting::read(&file, None)?;
        assert_eq!(setting.network.host, "127.0.0.2");
        assert_eq!(setting.checkout.currency, "usd");
        assert_eq!(setting.site(), "https://give.example.org");

        temp_env::with_vars(
            [
                ("GT_network.port", Some("1")),
                ("GT_network__host", Some("127.0.0.3")),
                ("GT_auth__admins", Some("a@ngo.org b@ngo.org")),
            ],
            || {
                let setting = Setting::read(&file, Some("GT".to_owned())).unwrap();
                assert_eq!(setting.network.host, "127.0.0.3".to_string());
                assert_eq!(setting.network.port, 1);
                assert!(setting.auth.is_admin("B@ngo.org"));
                assert!(!setting.auth.is_admin("c@ngo.org"));
            },
        );
        Ok(())
    }

    #[test]
    fn frontend() {
        let f = Frontend::default();
        assert_eq!(f.success("d1"), "http://localhost:3000/donation-success?id=d1");
        assert_eq!(f.failed(), "http://localhost:3000/donation-failed");
    }

    #[test]
    fn invalid_amounts() {
        let res = Setting::from_str(
            r#"{
                "gateway": "memory",
                "auth": {"secret": "0123456789abcdef"},
                "checkout": {"min_amount": 10, "max_amount": 5}
            }"#,
            FileFormat::Json,
        );
        assert!(res.is_err());
    }

    #[test]
    fn secret() {
        let conf = |secret: &str| {
            Setting::from_str(
                &format!(r#"{{"gateway": "memory", "auth": {{"secret": "{}"}}}}"#, secret),
                FileFormat::Json,
            )
        };
        assert!(Setting::default().validate().is_err());
        assert!(conf("").is_err());
        assert!(conf("test").is_err());
        assert!(conf("0123456789abcde").is_err());
        assert!(conf("0123456789abcdef").is_ok());
    }

    #[test]
    fn gateway_default() {
        assert_eq!(Setting::default().gateway, Gateway::Stripe);
        // stripe unless memory is asked for, which needs a key
        let res = Setting::from_str(
            r#"{"auth": {"secret": "0123456789abcdef"}}"#,
            FileFormat::Json,
        );
        assert!(res.is_err());
        let res = Setting::from_str(
            r#"{
                "auth": {"secret": "0123456789abcdef"},
                "stripe": {"secret_key": "sk_test_1"}
            }"#,
            FileFormat::Json,
        );
        assert_eq!(res.unwrap().gateway, Gateway::Stripe);
    }
}
