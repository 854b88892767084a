use crate::config::GraphConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use oauth2::{
    AuthType, Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet, Scope,
    StandardRevocableToken, TokenResponse, TokenUrl,
    basic::{
        BasicClient, BasicErrorResponse, BasicRevocationErrorResponse,
        BasicTokenIntrospectionResponse, BasicTokenResponse,
    },
};
use reqwest::redirect::Policy;
use tracing::{debug, instrument};

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Source of the bearer credential attached to every Graph request.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// A token obtained out of band.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

// Type alias for the client when only the Token URL is set
type ConfiguredClient = Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointNotSet, // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointSet,    // HasTokenUrl
>;

/// App-only authentication with the OAuth2 client-credentials grant.
pub struct ClientCredentialsAuth {
    client: ConfiguredClient,
    http_client: reqwest::Client,
}

impl ClientCredentialsAuth {
    pub fn new(config: &GraphConfig) -> Result<Self> {
        Self::with_token_url(config, config.token_url())
    }

    /// Same as [`ClientCredentialsAuth::new`] against an explicit token endpoint.
    pub fn with_token_url(config: &GraphConfig, token_url: String) -> Result<Self> {
        let token_url = TokenUrl::new(token_url)
            .map_err(|e| AppError::Auth(format!("Invalid token URL: {}", e)))?;

        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_type(AuthType::RequestBody)
            .set_token_uri(token_url);

        let http_client = reqwest::ClientBuilder::new()
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::Auth(format!("Failed to build reqwest client: {}", e)))?;

        Ok(Self {
            client,
            http_client,
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsAuth {
    #[instrument(name = "Requesting Graph access token", skip_all)]
    async fn access_token(&self) -> Result<String> {
        let token_result = self
            .client
            .exchange_client_credentials()
            .add_scope(Scope::new(GRAPH_SCOPE.to_string()))
            .request_async(&self.http_client)
            .await
            .map_err(|e| AppError::Auth(format!("Could not obtain access token: {:?}", e)))?;

        debug!(expires_in = ?token_result.expires_in(), "Obtained access token");

        Ok(token_result.access_token().secret().clone())
    }
}
