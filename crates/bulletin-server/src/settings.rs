//! Runtime configuration, read from a TOML file and `BULLETIN_*` environment
//! variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `BULLETIN_MAIL__API_KEY` overrides `mail.api_key`.

use std::{path::PathBuf, time::Duration};

use bulletin_core::{
  delivery::{DEFAULT_CONCURRENCY, DEFAULT_SEND_TIMEOUT, DeliveryConfig},
  subscriber::SubscriberEmail,
};
use secrecy::Secret;
use serde::Deserialize;

#[derive(Deserialize, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:       String,
  #[serde(default = "default_port")]
  pub port:       u16,
  /// Public origin that confirm and unsubscribe links point at.
  pub base_url:   String,
  #[serde(default = "default_store_path")]
  pub store_path: PathBuf,
  pub mail:       MailSettings,
  pub content:    ContentSettings,
  #[serde(default)]
  pub delivery:   DeliverySettings,
}

#[derive(Deserialize, Debug)]
pub struct MailSettings {
  pub api_base_url: String,
  pub api_key:      Secret<String>,
  pub sender:       SubscriberEmail,
  #[serde(default = "default_mail_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Deserialize, Debug)]
pub struct ContentSettings {
  pub api_base_url: String,
  #[serde(default = "default_content_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct DeliverySettings {
  pub concurrency:       usize,
  pub send_timeout_secs: u64,
}

impl Default for DeliverySettings {
  fn default() -> Self {
    Self {
      concurrency:       DEFAULT_CONCURRENCY,
      send_timeout_secs: DEFAULT_SEND_TIMEOUT.as_secs(),
    }
  }
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 8000 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/bulletin/bulletin.db") }
fn default_mail_timeout_secs() -> u64 { 10 }
fn default_content_timeout_secs() -> u64 { 30 }

impl ServerConfig {
  /// Layer `file` under the `BULLETIN_` environment.
  pub fn load(
    file: impl config::Source + Send + Sync + 'static,
    env: config::Environment,
  ) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(file)
      .add_source(env)
      .build()?
      .try_deserialize()
  }

  pub fn environment() -> config::Environment {
    config::Environment::with_prefix("BULLETIN")
      .prefix_separator("_")
      .separator("__")
  }

  pub fn mail_timeout(&self) -> Duration { Duration::from_secs(self.mail.timeout_secs) }

  pub fn content_timeout(&self) -> Duration {
    Duration::from_secs(self.content.timeout_secs)
  }

  pub fn delivery_config(&self) -> DeliveryConfig {
    DeliveryConfig {
      concurrency:  self.delivery.concurrency,
      send_timeout: Duration::from_secs(self.delivery.send_timeout_secs),
      base_url:     self.base_url.clone(),
    }
  }
}
