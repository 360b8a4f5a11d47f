use reqwest::StatusCode;
use thiserror::Error;

/// Terminal errors of a single generation.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("comfyui base url is required")]
    MissingBaseUrl,

    #[error("comfyui submit failed: {0}")]
    SubmitTransport(#[source] reqwest::Error),

    #[error("comfyui submit {status}: {body}")]
    Submit { status: StatusCode, body: String },

    #[error("comfyui submit response could not be decoded: {0}")]
    SubmitDecode(#[source] serde_json::Error),

    #[error("comfyui submit response contains no prompt_id")]
    MissingJobId,

    #[error("comfyui timed out after {attempts} polls waiting for a result")]
    Timeout { attempts: u32 },
}

/// Failure of one history poll. These never reach the caller, the poll loop
/// logs them and keeps going.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("history request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("history request returned {0}")]
    Status(StatusCode),

    #[error("history payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}
