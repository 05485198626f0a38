use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::flow::Phase;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("identity pool configuration incomplete: {0} is empty")]
    Misconfigured(&'static str),
    #[error("identity service rejected the exchange: {0}")]
    Service(String),
    #[error("identity service response missing {0}")]
    Incomplete(&'static str),
}

#[derive(Error, Debug)]
pub enum InvokeError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("invocation of '{function}' failed: {message}")]
    Transport { function: String, message: String },
    #[error("function '{function}' reported an error: {kind}")]
    Function { function: String, kind: String },
    #[error("malformed reply: {0}")]
    MalformedReply(String),
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("session has no identity token")]
    MissingToken,
    #[error("identity token expired")]
    ExpiredToken,
    #[error(transparent)]
    Exchange(#[from] ExchangeError),
    #[error(transparent)]
    Invoke(#[from] InvokeError),
}

impl SubmitError {
    /// The flow phase the error belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            Self::MissingToken | Self::ExpiredToken | Self::Exchange(_) => Phase::Authenticating,
            Self::Invoke(_) => Phase::Invoking,
        }
    }

    /// Short text shown to the user. Details stay in the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingToken | Self::ExpiredToken => {
                "Your session has expired. Sign in again and resubmit."
            }
            Self::Exchange(_) => "Could not obtain access for your session. Try again later.",
            Self::Invoke(_) => "The service did not return a usable response. Try again later.",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed form: {0}")]
    MalformedForm(String),

    #[error("Workspace state unavailable")]
    StatePoisoned,

    #[error("Failed to render page")]
    Render(#[from] std::fmt::Error),

    #[error("Submission task failed")]
    TaskFailed,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self {
            AppError::MalformedForm { .. } => StatusCode::BAD_REQUEST,
            AppError::StatePoisoned | AppError::Render(_) | AppError::TaskFailed => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, self.to_string()).into_response()
    }
}
