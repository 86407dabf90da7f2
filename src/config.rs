use std::env::{self, VarError};

use reqwest::Url;

use crate::error::{config_error, Error};

pub const ENDPOINT_VAR: &str = "PRICEOPTIMA_ENDPOINT";
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/predict";

#[derive(Clone, Debug)]
pub struct Config {
    pub endpoint: Url,
}

impl Config {
    pub fn new(endpoint: &str) -> Result<Self, Error> {
        let endpoint = Url::parse(endpoint)
            .map_err(|err| config_error().with_detail(format!("{}: {}", endpoint, err)))?;

        if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
            return Err(config_error().with_detail(format!(
                "unsupported scheme '{}' in {}",
                endpoint.scheme(),
                endpoint
            )));
        }

        Ok(Self { endpoint })
    }

    /// Reads `.env` when present, then `PRICEOPTIMA_ENDPOINT`.
    pub fn from_env() -> Result<Self, Error> {
        dotenv::dotenv().ok();

        Self::from_var(env::var(ENDPOINT_VAR))
    }

    fn from_var(var: Result<String, VarError>) -> Result<Self, Error> {
        match var {
            Ok(endpoint) => Self::new(&endpoint),
            Err(VarError::NotPresent) => Self::new(DEFAULT_ENDPOINT),
            Err(err @ VarError::NotUnicode(_)) => {
                Err(config_error().with_detail(format!("{}: {}", ENDPOINT_VAR, err)))
            }
        }
    }

    pub fn predict_url(&self) -> Url {
        self.endpoint.clone()
    }

    pub fn health_url(&self) -> Url {
        self.sibling("health")
    }

    pub fn batch_url(&self) -> Url {
        self.sibling("predict_batch")
    }

    // swaps the trailing `/predict` segment for another route on the same service
    fn sibling(&self, route: &str) -> Url {
        let mut url = self.endpoint.clone();
        let path = url.path().trim_end_matches('/');
        let base = path.strip_suffix("/predict").unwrap_or(path).to_string();
        url.set_path(&format!("{}/{}", base, route));
        url.set_query(None);
        url
    }
}

#[test]
fn default_endpoint() {
    let config = Config::new(DEFAULT_ENDPOINT).unwrap();

    assert_eq!(config.predict_url().as_str(), "http://127.0.0.1:8000/predict");
    assert_eq!(config.health_url().as_str(), "http://127.0.0.1:8000/health");
    assert_eq!(config.batch_url().as_str(), "http://127.0.0.1:8000/predict_batch");
}

#[test]
fn sibling_routes_keep_prefix() {
    let config = Config::new("https://pricing.example.com/api/v1/predict").unwrap();

    assert_eq!(
        config.health_url().as_str(),
        "https://pricing.example.com/api/v1/health"
    );

    let config = Config::new("http://localhost:9000").unwrap();
    assert_eq!(config.health_url().as_str(), "http://localhost:9000/health");
}

#[test]
fn rejects_bad_endpoints() {
    assert_eq!(Config::new("not a url").unwrap_err().code, 1);
    assert_eq!(Config::new("ftp://127.0.0.1/predict").unwrap_err().code, 1);
}

#[test]
fn endpoint_variable_lookup() {
    use std::ffi::OsString;

    let config = Config::from_var(Err(VarError::NotPresent)).unwrap();
    assert_eq!(config.predict_url().as_str(), DEFAULT_ENDPOINT);

    let config = Config::from_var(Ok("http://10.0.0.7:9000/predict".into())).unwrap();
    assert_eq!(config.health_url().as_str(), "http://10.0.0.7:9000/health");

    let err = Config::from_var(Err(VarError::NotUnicode(OsString::from("bad")))).unwrap_err();
    assert_eq!(err.code, 1);
    assert!(err.diagnostic().starts_with(ENDPOINT_VAR));

    assert_eq!(Config::from_var(Ok("".into())).unwrap_err().code, 1);
}
