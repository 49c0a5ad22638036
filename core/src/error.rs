use thiserror::Error;

pub type Result<T> = std::result::Result<T, OpsdeckErr>;

#[derive(Debug, Error)]
pub enum OpsdeckErr {
    #[error("command id must not be empty")]
    EmptyCommandId,

    #[error("no API key configured; set {0}")]
    MissingApiKey(&'static str),

    #[error("invalid backend URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("stream endpoint returned unexpected content type `{0}`")]
    NotAnEventStream(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
