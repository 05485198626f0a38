use std::future::Future;

use aws_config::{Region, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_lambda::{Client, error::DisplayErrorContext, primitives::Blob, types::InvocationType};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::InvokeError, form::SubmissionRequest};

#[derive(Debug, Clone, Serialize)]
pub struct InvokePayload {
    pub prompt: String,
    pub parameters: SubmissionRequest,
}

impl InvokePayload {
    pub fn new(prompt: impl Into<String>, parameters: SubmissionRequest) -> Self {
        Self {
            prompt: prompt.into(),
            parameters,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, InvokeError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Deserialize)]
struct Reply {
    body: String,
}

/// Pulls the `body` text out of a function reply.
pub fn decode_reply(bytes: &[u8]) -> Result<String, InvokeError> {
    let reply: Reply = serde_json::from_slice(bytes)
        .map_err(|e| InvokeError::MalformedReply(e.to_string()))?;

    Ok(reply.body)
}

pub trait Invoker {
    fn invoke(
        &self,
        credentials: Credentials,
        function_name: &str,
        payload: &InvokePayload,
    ) -> impl Future<Output = Result<String, InvokeError>> + Send;
}

pub struct LambdaInvoker {
    sdk_config: SdkConfig,
    region: Region,
}

impl LambdaInvoker {
    pub fn new(sdk_config: SdkConfig, region: impl Into<String>) -> Self {
        Self {
            sdk_config,
            region: Region::new(region.into()),
        }
    }

    /// A fresh client per submission, bound to that submission's credentials.
    fn client(&self, credentials: Credentials) -> Client {
        let config = aws_sdk_lambda::config::Builder::from(&self.sdk_config)
            .region(self.region.clone())
            .credentials_provider(credentials)
            .build();

        Client::from_conf(config)
    }
}

impl Invoker for LambdaInvoker {
    async fn invoke(
        &self,
        credentials: Credentials,
        function_name: &str,
        payload: &InvokePayload,
    ) -> Result<String, InvokeError> {
        let bytes = payload.to_bytes()?;
        debug!("Invoking {function_name} with {} byte payload", bytes.len());

        let output = self
            .client(credentials)
            .invoke()
            .function_name(function_name)
            .invocation_type(InvocationType::RequestResponse)
            .payload(Blob::new(bytes))
            .send()
            .await
            .map_err(|e| InvokeError::Transport {
                function: function_name.to_string(),
                message: DisplayErrorContext(e).to_string(),
            })?;

        if let Some(kind) = output.function_error() {
            warn!("{function_name} returned status {}", output.status_code());
            return Err(InvokeError::Function {
                function: function_name.to_string(),
                kind: kind.to_string(),
            });
        }

        let payload = output
            .payload()
            .ok_or_else(|| InvokeError::MalformedReply("empty payload".to_string()))?;

        decode_reply(payload.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::form::filled_values;

    #[test]
    fn payload_wraps_parameters_under_prompt() {
        let payload = InvokePayload::new("PROMPT#123", filled_values().validate().unwrap());
        let value: Value = serde_json::from_slice(&payload.to_bytes().unwrap()).unwrap();

        assert_eq!(value["prompt"], "PROMPT#123");
        assert_eq!(value["parameters"]["client"], "client value");
        assert_eq!(value["parameters"].as_object().unwrap().len(), 7);
        assert!(
            value["parameters"]
                .as_object()
                .unwrap()
                .values()
                .all(Value::is_string)
        );
    }

    #[test]
    fn reply_body_is_extracted() {
        let raw = json!({ "statusCode": 200, "body": "**hello**" }).to_string();
        assert_eq!(decode_reply(raw.as_bytes()).unwrap(), "**hello**");
    }

    #[test]
    fn reply_without_string_body_is_malformed() {
        for raw in [r#"{"statusCode":200}"#, r#"{"body":42}"#, "not json", ""] {
            assert!(
                matches!(decode_reply(raw.as_bytes()), Err(InvokeError::MalformedReply(_))),
                "{raw}"
            );
        }
    }
}
