use crate::resources::common::Labels;
use serde::Deserialize;
use std::fs::File;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to read config file: {0}")]
    IO(std::io::Error),

    #[error("Unable to deserialize config file: {0}")]
    Parse(serde_yml::Error),

    #[error("Invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Istio,
    Contour,
}

#[derive(Debug, Default, Deserialize)]
pub struct IstioConfig {
    #[serde(default)]
    pub gateways: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContourConfig {
    pub tls_secret_name: Option<String>,
    #[serde(default)]
    pub https_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub provider: Provider,
    #[serde(default)]
    pub istio: IstioConfig,
    #[serde(default)]
    pub contour: ContourConfig,
    /// Namespace to list Routes in. Cluster-wide when absent.
    pub namespace: Option<String>,
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
    #[serde(default)]
    pub api: ApiConfig,
    /// Copied onto every object the controller creates.
    #[serde(default)]
    pub labels: Labels,
}

fn default_api_port() -> u16 {
    8081
}

fn default_resync_interval_secs() -> u64 {
    30
}

pub fn load(filename: &str) -> Result<Config, Error> {
    let file = File::open(filename).map_err(Error::IO)?;
    let config = serde_yml::from_reader(file).map_err(Error::Parse)?;
    validate(config)
}

pub fn parse(contents: &str) -> Result<Config, Error> {
    let config = serde_yml::from_str(contents).map_err(Error::Parse)?;
    validate(config)
}

fn validate(config: Config) -> Result<Config, Error> {
    if config.provider == Provider::Istio && config.istio.gateways.is_empty() {
        return Err(Error::Invalid("istio.gateways must name at least one gateway"));
    }
    if config.resync_interval_secs == 0 {
        return Err(Error::Invalid("resync_interval_secs must be greater than zero"));
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_istio_config_with_defaults() {
        let config = parse(
            r#"
provider: istio
istio:
  gateways:
    - cf-system/istio-ingressgateway
"#,
        )
        .unwrap();

        assert_eq!(config.provider, Provider::Istio);
        assert_eq!(config.istio.gateways, vec!["cf-system/istio-ingressgateway"]);
        assert_eq!(config.namespace, None);
        assert_eq!(config.resync_interval_secs, 30);
        assert_eq!(config.api.port, 8081);
        assert!(config.labels.is_empty());
    }

    #[test]
    fn parses_contour_config() {
        let config = parse(
            r#"
provider: contour
contour:
  tls_secret_name: cf-system/ingress-cert
  https_only: true
namespace: cf-workloads
resync_interval_secs: 10
api:
  port: 9000
labels:
  team: routing
"#,
        )
        .unwrap();

        assert_eq!(config.provider, Provider::Contour);
        assert_eq!(
            config.contour.tls_secret_name.as_deref(),
            Some("cf-system/ingress-cert")
        );
        assert!(config.contour.https_only);
        assert_eq!(config.namespace.as_deref(), Some("cf-workloads"));
        assert_eq!(config.resync_interval_secs, 10);
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.labels.get("team").map(String::as_str), Some("routing"));
    }

    #[test]
    fn rejects_istio_without_gateways() {
        assert!(matches!(parse("provider: istio"), Err(Error::Invalid(_))));
    }

    #[test]
    fn rejects_zero_resync_interval() {
        let result = parse("provider: contour\nresync_interval_secs: 0");
        assert!(matches!(result, Err(Error::Invalid(_))));
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!(matches!(parse("provider: nginx"), Err(Error::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            load("/nonexistent/routecontroller.yaml"),
            Err(Error::IO(_))
        ));
    }
}
