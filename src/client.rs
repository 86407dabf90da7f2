use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::{
    config::Config,
    entities::{BatchPrediction, Health, Prediction, RideRequest},
    error::{invalid_input_error, malformed_response_error, upstream_status_error, Error},
};

/// The remote pricing service.
#[async_trait]
pub trait Predictor {
    async fn predict(&self, request: &RideRequest) -> Result<Prediction, Error>;
    async fn health(&self) -> Result<Health, Error>;
    async fn predict_batch(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<Vec<BatchPrediction>, Error>;
}

pub type DynPredictor = Arc<dyn Predictor + Send + Sync>;

#[derive(Deserialize)]
#[serde(untagged)]
enum Price {
    Number(f64),
    Text(String),
}

#[derive(Deserialize)]
struct PredictResponse {
    predicted_price: Price,
}

#[derive(Deserialize)]
struct ErrorResponse {
    detail: serde_json::Value,
}

#[derive(Clone, Debug)]
pub struct HttpPredictor {
    client: reqwest::Client,
    config: Config,
}

impl HttpPredictor {
    pub fn new(config: Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    #[tracing::instrument(skip(self))]
    async fn predict(&self, request: &RideRequest) -> Result<Prediction, Error> {
        let res = self
            .client
            .post(self.config.predict_url())
            .json(request)
            .send()
            .await?;

        let data: PredictResponse = read_json(res).await?;

        let price = match data.predicted_price {
            Price::Number(price) => price,
            Price::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| malformed_response_error(format!("predicted_price '{}'", text)))?,
        };

        if !price.is_finite() {
            return Err(malformed_response_error("predicted_price is not finite"));
        }

        Ok(Prediction::new(price))
    }

    #[tracing::instrument(skip(self))]
    async fn health(&self) -> Result<Health, Error> {
        let res = self.client.get(self.config.health_url()).send().await?;

        read_json(res).await
    }

    #[tracing::instrument(skip(self, contents))]
    async fn predict_batch(
        &self,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<Vec<BatchPrediction>, Error> {
        if !file_name.ends_with(".csv") {
            return Err(invalid_input_error()
                .with_detail("Invalid file type. Please upload a CSV."));
        }

        // the service only sees the base name
        let base_name = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file_name)
            .to_string();

        let part = Part::bytes(contents)
            .file_name(base_name)
            .mime_str("text/csv")?;

        let res = self
            .client
            .post(self.config.batch_url())
            .multipart(Form::new().part("file", part))
            .send()
            .await?;

        read_json(res).await
    }
}

async fn read_json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, Error> {
    let status = res.status();
    let body = res.bytes().await?;

    if !status.is_success() {
        let err = upstream_status_error(status.as_u16());

        return Err(match serde_json::from_slice::<ErrorResponse>(&body) {
            Ok(ErrorResponse {
                detail: serde_json::Value::String(detail),
            }) => err.with_detail(detail),
            Ok(ErrorResponse { detail }) if !detail.is_null() => err.with_detail(detail.to_string()),
            _ => err,
        });
    }

    Ok(serde_json::from_slice(&body)?)
}
