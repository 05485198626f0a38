//! Turns an ID token into temporary AWS credentials through a Cognito
//! identity pool.
use std::{
    collections::HashMap,
    future::Future,
    sync::Mutex,
    time::{Duration, SystemTime},
};

use aws_config::SdkConfig;
use aws_credential_types::Credentials;
use aws_sdk_cognitoidentity::{Client, error::DisplayErrorContext};
use tracing::{debug, info};

use crate::{config::CognitoConfig, error::ExchangeError, session::IdToken, session::login_key};

const PROVIDER_NAME: &str = "CognitoIdentity";

pub trait CredentialExchange {
    fn exchange(
        &self,
        token: &IdToken,
    ) -> impl Future<Output = Result<Credentials, ExchangeError>> + Send;
}

pub struct CognitoExchange {
    client: Client,
    config: CognitoConfig,
}

impl CognitoExchange {
    pub fn new(sdk_config: &SdkConfig, config: CognitoConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
            config,
        }
    }
}

fn check_config(config: &CognitoConfig) -> Result<(), ExchangeError> {
    if config.identity_pool_id.is_empty() {
        return Err(ExchangeError::Misconfigured("identity_pool_id"));
    }
    if config.provider_region.is_empty() {
        return Err(ExchangeError::Misconfigured("provider_region"));
    }
    if config.user_pool_id.is_empty() {
        return Err(ExchangeError::Misconfigured("user_pool_id"));
    }

    Ok(())
}

impl CredentialExchange for CognitoExchange {
    async fn exchange(&self, token: &IdToken) -> Result<Credentials, ExchangeError> {
        check_config(&self.config)?;

        let login = login_key(&self.config.provider_region, &self.config.user_pool_id);

        let identity = self
            .client
            .get_id()
            .identity_pool_id(&self.config.identity_pool_id)
            .logins(&login, token.as_str())
            .send()
            .await
            .map_err(|e| ExchangeError::Service(DisplayErrorContext(e).to_string()))?;
        let identity_id = identity
            .identity_id()
            .ok_or(ExchangeError::Incomplete("identity id"))?;

        debug!("Resolved identity {identity_id}");

        let output = self
            .client
            .get_credentials_for_identity()
            .identity_id(identity_id)
            .logins(&login, token.as_str())
            .send()
            .await
            .map_err(|e| ExchangeError::Service(DisplayErrorContext(e).to_string()))?;
        let credentials = output
            .credentials()
            .ok_or(ExchangeError::Incomplete("credentials"))?;

        let access_key_id = credentials
            .access_key_id()
            .ok_or(ExchangeError::Incomplete("access key id"))?;
        let secret_key = credentials
            .secret_key()
            .ok_or(ExchangeError::Incomplete("secret key"))?;
        let expiry = credentials
            .expiration()
            .and_then(|dt| SystemTime::try_from(*dt).ok());

        Ok(Credentials::new(
            access_key_id,
            secret_key,
            credentials.session_token().map(str::to_string),
            expiry,
            PROVIDER_NAME,
        ))
    }
}

/// Reuses credentials per token until they get close to expiring.
pub struct CachedExchange<E> {
    inner: E,
    refresh_margin: Duration,
    entries: Mutex<HashMap<String, Credentials>>,
}

impl<E> CachedExchange<E> {
    pub fn new(inner: E, refresh_margin: Duration) -> Self {
        Self {
            inner,
            refresh_margin,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn fresh(&self, credentials: &Credentials, now: SystemTime) -> bool {
        // No expiry means we cannot tell, so never reuse.
        credentials
            .expiry()
            .and_then(|exp| exp.checked_sub(self.refresh_margin))
            .is_some_and(|deadline| deadline > now)
    }

    fn lookup(&self, token: &IdToken, now: SystemTime) -> Option<Credentials> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(token.as_str())
            .filter(|c| self.fresh(c, now))
            .cloned()
    }

    fn store(&self, token: &IdToken, credentials: &Credentials, now: SystemTime) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };

        entries.retain(|_, c| self.fresh(c, now));
        if self.fresh(credentials, now) {
            entries.insert(token.as_str().to_string(), credentials.clone());
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl<E> CredentialExchange for CachedExchange<E>
where
    E: CredentialExchange + Sync,
{
    async fn exchange(&self, token: &IdToken) -> Result<Credentials, ExchangeError> {
        let now = SystemTime::now();
        if let Some(credentials) = self.lookup(token, now) {
            debug!("Reusing cached credentials");
            return Ok(credentials);
        }

        let credentials = self.inner.exchange(token).await?;
        self.store(token, &credentials, SystemTime::now());
        info!("Exchanged identity token for credentials");

        Ok(credentials)
    }
}
