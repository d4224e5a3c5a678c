use async_trait::async_trait;
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use yup_oauth2::{ApplicationSecret, InstalledFlowAuthenticator, InstalledFlowReturnMethod};

pub const KEYRING_SERVICE_NAME: &str = "inbox-export-gmail-credentials";
pub const KEYRING_USERNAME: &str = "default_user";

/// Read-only access is all the export needs.
pub const GMAIL_SCOPES: &[&str] = &["https://www.googleapis.com/auth/gmail.readonly"];

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),
    #[error("stored credentials are unreadable: {0}")]
    Stored(#[from] serde_json::Error),
    #[error("client secret not found at {path}: {source}")]
    ClientSecret {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("OAuth flow failed: {0}")]
    Flow(String),
}

/// An opaque bearer token. Nothing outside the HTTP client reads it.
#[derive(Clone)]
pub struct Credentials {
    access_token: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    pub(crate) fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_credentials(&self) -> Result<Credentials, AuthError>;
}

#[derive(Serialize, Deserialize, Clone, Default)]
pub struct SecureCredentials {
    pub client_secret: Option<ApplicationSecret>,
    pub token: Option<String>,
}

impl SecureCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_secret(mut self, secret: ApplicationSecret) -> Self {
        self.client_secret = Some(secret);
        self
    }

    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

// Define a trait for Keyring operations to allow mocking
#[cfg_attr(test, mockall::automock)]
pub trait KeyringEntry: Send + Sync {
    fn get_password(&self) -> Result<String, keyring::Error>;
    fn set_password(&self, password: &str) -> Result<(), keyring::Error>;
    fn delete_password(&self) -> Result<(), keyring::Error>;
}

// Implement the trait for the real keyring::Entry
impl KeyringEntry for Entry {
    fn get_password(&self) -> Result<String, keyring::Error> {
        self.get_password()
    }
    fn set_password(&self, password: &str) -> Result<(), keyring::Error> {
        self.set_password(password)
    }
    fn delete_password(&self) -> Result<(), keyring::Error> {
        self.delete_password()
    }
}

// Define a trait for OAuth flow operations to allow mocking
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OAuthFlow: Send + Sync {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<String, AuthError>;
}

// Browser-based installed-app flow
pub struct RealOAuthFlow;

#[async_trait]
impl OAuthFlow for RealOAuthFlow {
    async fn perform_flow(
        &self,
        secret: ApplicationSecret,
        scopes: Vec<String>,
    ) -> Result<String, AuthError> {
        let auth =
            InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
                .build()
                .await
                .map_err(|e| AuthError::Flow(e.to_string()))?;
        let scopes_refs: Vec<&str> = scopes.iter().map(|s| s.as_str()).collect();
        let token = auth
            .token(&scopes_refs)
            .await
            .map_err(|e| AuthError::Flow(e.to_string()))?;
        token
            .token()
            .map(str::to_string)
            .ok_or_else(|| AuthError::Flow("token response had no access token".to_string()))
    }
}

/// Credential provider that keeps the client secret and token in the system
/// keyring, running the browser flow when no token is stored.
pub struct KeyringCredentialProvider<K = Entry, O = RealOAuthFlow> {
    keyring: K,
    oauth_flow: O,
    client_secret_path: PathBuf,
}

impl KeyringCredentialProvider {
    pub fn new(client_secret_path: impl Into<PathBuf>) -> Result<Self, AuthError> {
        let keyring = Entry::new(KEYRING_SERVICE_NAME, KEYRING_USERNAME)?;
        Ok(Self::with_parts(keyring, RealOAuthFlow, client_secret_path))
    }
}

impl<K: KeyringEntry, O: OAuthFlow> KeyringCredentialProvider<K, O> {
    pub fn with_parts(keyring: K, oauth_flow: O, client_secret_path: impl Into<PathBuf>) -> Self {
        Self {
            keyring,
            oauth_flow,
            client_secret_path: client_secret_path.into(),
        }
    }

    fn load_secure_credentials(&self) -> Result<SecureCredentials, AuthError> {
        let credentials_json = self.keyring.get_password()?;
        Ok(serde_json::from_str(&credentials_json)?)
    }

    fn save_secure_credentials(&self, credentials: &SecureCredentials) -> Result<(), AuthError> {
        let credentials_json = serde_json::to_string(credentials)?;
        self.keyring.set_password(&credentials_json)?;
        Ok(())
    }

    // Client secret from the keyring, else from the file (and cache it)
    async fn load_client_secret(&self) -> Result<ApplicationSecret, AuthError> {
        if let Ok(credentials) = self.load_secure_credentials() {
            if let Some(secret) = credentials.client_secret {
                return Ok(secret);
            }
        }

        let secret = yup_oauth2::read_application_secret(&self.client_secret_path)
            .await
            .map_err(|source| AuthError::ClientSecret {
                path: self.client_secret_path.clone(),
                source,
            })?;

        let credentials = self
            .load_secure_credentials()
            .unwrap_or_default()
            .with_client_secret(secret.clone());
        if let Err(e) = self.save_secure_credentials(&credentials) {
            tracing::warn!("Failed to save client secret to keyring: {}", e);
        }
        Ok(secret)
    }

    async fn perform_oauth_flow(&self, secret: ApplicationSecret) -> Result<String, AuthError> {
        let scopes = GMAIL_SCOPES.iter().map(|s| s.to_string()).collect();
        let token = self.oauth_flow.perform_flow(secret.clone(), scopes).await?;

        let credentials = self
            .load_secure_credentials()
            .unwrap_or_default()
            .with_client_secret(secret)
            .with_token(token.clone());
        if let Err(e) = self.save_secure_credentials(&credentials) {
            tracing::warn!("Failed to save credentials to keyring: {}", e);
        }
        Ok(token)
    }
}

#[async_trait]
impl<K: KeyringEntry, O: OAuthFlow> CredentialProvider for KeyringCredentialProvider<K, O> {
    async fn get_credentials(&self) -> Result<Credentials, AuthError> {
        let secret = self.load_client_secret().await?;

        if let Ok(credentials) = self.load_secure_credentials() {
            if let Some(token) = credentials.token {
                tracing::debug!("Using token from keyring");
                return Ok(Credentials::new(token));
            }
        }

        match self.perform_oauth_flow(secret).await {
            Ok(token) => Ok(Credentials::new(token)),
            Err(e) => {
                tracing::warn!("Authentication failed: {}", e);
                tracing::warn!("Clearing keyring and re-reading the client secret file...");
                // Clear credentials from keyring to force re-reading the client secret
                if let Err(e) = clear_keyring(&self.keyring) {
                    tracing::warn!("Failed to clear keyring: {}", e);
                }
                let secret = self.load_client_secret().await?;
                let token = self.perform_oauth_flow(secret).await?;
                Ok(Credentials::new(token))
            }
        }
    }
}

/// Remove stored credentials from the system keyring.
pub fn clear_keyring<K: KeyringEntry>(keyring: &K) -> Result<(), AuthError> {
    match keyring.delete_password() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}
