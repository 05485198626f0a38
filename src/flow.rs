//! Submission flow.
//!
//! A workspace with nothing in flight is idle.
//!
//! ```text
//! Idle -> Validating -> Invalid ------------------------------> Idle
//!                    \-> Authenticating -> Invoking -> Rendering -> Idle
//!                              \--------------\--> Failed ------> Idle
//! ```
//!
//! [`Submitter`] drives one submission through the phases. [`Workspace`] is
//! the state a single browser sees, and decides which outcome ends up on
//! screen when submissions overlap.
use chrono::Utc;
use tracing::{debug, error, info};

use crate::{
    config::{AwsConfig, FlowPolicy, ResponseOrder},
    credentials::CredentialExchange,
    error::SubmitError,
    form::{FieldErrors, FormValues, SubmissionRequest},
    invoke::{InvokePayload, Invoker},
    session::SessionProvider,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Validating,
    Authenticating,
    Invoking,
    Rendering,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    Invalid(FieldErrors),
    Failed { phase: Phase, error: SubmitError },
    Completed(String),
}

pub struct Submitter<E, I> {
    aws: AwsConfig,
    exchange: E,
    invoker: I,
}

impl<E, I> Submitter<E, I>
where
    E: CredentialExchange + Sync,
    I: Invoker + Sync,
{
    pub fn new(aws: AwsConfig, exchange: E, invoker: I) -> Self {
        Self {
            aws,
            exchange,
            invoker,
        }
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    /// Runs one submission. Errors end up in the outcome, never in a panic.
    pub async fn submit<S>(&self, session: &S, values: &FormValues) -> SubmitOutcome
    where
        S: SessionProvider + Sync,
    {
        debug!(phase = ?Phase::Validating);
        let request = match values.validate() {
            Ok(request) => request,
            Err(errors) => {
                debug!("Submission blocked by {} missing field(s)", errors.len());
                return SubmitOutcome::Invalid(errors);
            }
        };

        match self.dispatch(session, request).await {
            Ok(body) => {
                info!("Submission completed with {} byte reply", body.len());
                SubmitOutcome::Completed(body)
            }
            Err(error) => {
                let phase = error.phase();
                error!(?phase, "Submission failed: {error}");
                SubmitOutcome::Failed { phase, error }
            }
        }
    }

    async fn dispatch<S>(&self, session: &S, request: SubmissionRequest) -> Result<String, SubmitError>
    where
        S: SessionProvider + Sync,
    {
        debug!(phase = ?Phase::Authenticating);
        let token = session.id_token().await.ok_or(SubmitError::MissingToken)?;
        if token.is_expired(Utc::now()) {
            return Err(SubmitError::ExpiredToken);
        }

        let credentials = self.exchange.exchange(&token).await?;

        debug!(phase = ?Phase::Invoking);
        let payload = InvokePayload::new(&self.aws.prompt, request);
        let body = self
            .invoker
            .invoke(credentials, &self.aws.function_name, &payload)
            .await?;

        Ok(body)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Non-blocking message shown above the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: &'static str,
}

#[derive(Debug, Default)]
pub struct Workspace {
    values: FormValues,
    errors: FieldErrors,
    response: String,
    notice: Option<Notice>,
    issued: u64,
    in_flight: usize,
}

impl Workspace {
    pub fn values(&self) -> &FormValues {
        &self.values
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn response(&self) -> &str {
        &self.response
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn busy(&self) -> bool {
        self.in_flight > 0
    }

    /// Records the values being submitted and hands out a ticket for the outcome.
    pub fn begin(&mut self, values: FormValues) -> Ticket {
        self.values = values;
        self.issued += 1;
        self.in_flight += 1;

        Ticket(self.issued)
    }

    /// Applies an outcome. Returns whether it changed what is displayed.
    pub fn settle(&mut self, ticket: Ticket, outcome: SubmitOutcome, policy: &FlowPolicy) -> bool {
        self.in_flight = self.in_flight.saturating_sub(1);

        let current = ticket.0 == self.issued;
        let applies = current || policy.response_order == ResponseOrder::LastResolved;

        match outcome {
            SubmitOutcome::Invalid(errors) => {
                if !current {
                    return false;
                }
                self.errors = errors;
                true
            }
            SubmitOutcome::Completed(body) => {
                if !applies {
                    debug!(?ticket, "Discarding stale response");
                    return false;
                }
                debug!(phase = ?Phase::Rendering);
                self.response = body;
                // Errors and notices belong to the newest submission.
                if current {
                    self.errors = FieldErrors::default();
                    self.notice = None;
                }
                true
            }
            SubmitOutcome::Failed { error, .. } => {
                let cleared = current && !self.errors.is_empty();
                if cleared {
                    self.errors = FieldErrors::default();
                }
                if !applies || !policy.surface_failures {
                    return cleared;
                }
                self.notice = Some(Notice {
                    message: error.user_message(),
                });
                true
            }
        }
    }
}
