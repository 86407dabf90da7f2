use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub code: i32,
    pub message: String,
    pub detail: Option<String>,
}

impl Error {
    /// What goes to the diagnostic log: the server's detail when it sent one.
    pub fn diagnostic(&self) -> &str {
        self.detail.as_deref().unwrap_or(&self.message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({}): {}", self.message, self.code, detail),
            None => write!(f, "{} ({})", self.message, self.code),
        }
    }
}

impl std::error::Error for Error {}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        transport_error(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        io_error(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        malformed_response_error(err)
    }
}

pub fn invalid_input_error() -> Error {
    Error {
        code: 101,
        message: "invalid input".into(),
        detail: None,
    }
}

pub fn config_error() -> Error {
    Error {
        code: 1,
        message: "configuration error".into(),
        detail: None,
    }
}

pub fn io_error(err: std::io::Error) -> Error {
    Error {
        code: 2,
        message: "io error".into(),
        detail: Some(err.to_string()),
    }
}

pub fn transport_error(err: reqwest::Error) -> Error {
    Error {
        code: 3,
        message: err.to_string(),
        detail: None,
    }
}

pub fn upstream_status_error(status: u16) -> Error {
    Error {
        code: 4,
        message: format!("upstream responded with status {}", status),
        detail: None,
    }
}

pub fn malformed_response_error<T: fmt::Display>(err: T) -> Error {
    Error {
        code: 4,
        message: format!("malformed response: {}", err),
        detail: None,
    }
}

#[test]
fn diagnostic_prefers_detail() {
    let err = upstream_status_error(500).with_detail("model unavailable");
    assert_eq!(err.diagnostic(), "model unavailable");

    let err = upstream_status_error(503);
    assert_eq!(err.diagnostic(), "upstream responded with status 503");
}

#[test]
fn display_includes_code_and_detail() {
    let err = invalid_input_error().with_detail("unknown field 'Riders'");
    assert_eq!(err.to_string(), "invalid input (101): unknown field 'Riders'");
    assert_eq!(config_error().to_string(), "configuration error (1)");
}
