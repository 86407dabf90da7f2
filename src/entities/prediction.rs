use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entities::Field;

/// A ride price returned by the prediction endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub price: f64,
}

impl Prediction {
    pub fn new(price: f64) -> Self {
        Self { price }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "₹{:.2}", self.price)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub model_loaded: bool,
}

impl Health {
    pub fn is_ready(&self) -> bool {
        self.status == "ok" && self.model_loaded
    }
}

/// One row of a batch upload echoed back with its price. The service returns
/// the uploaded columns unchanged, so they are kept as sent rather than
/// checked against the form's options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    #[serde(flatten)]
    pub columns: Map<String, Value>,
    pub predicted_price: f64,
}

impl BatchPrediction {
    pub fn prediction(&self) -> Prediction {
        Prediction::new(self.predicted_price)
    }

    /// The column as it would appear in the csv, empty when absent.
    pub fn column(&self, field: Field) -> String {
        match self.columns.get(field.name()) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(value) => value.to_string(),
        }
    }
}
