//! Email facade over the token manager and the Graph client.

use std::collections::HashMap;
use std::sync::Arc;

use graphmail_oauth::{
    AuthorizationRequest, Credential, OAuthClient, Provider, TokenInfo, TokenManager, TokenStore,
};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::graph::GraphClient;
use crate::message::{OutgoingMessage, Sender};
use crate::template::render_template;

/// Outcome of [`EmailService::send_bulk_email`].
#[derive(Debug, Default)]
pub struct BulkSendReport {
    /// Number of sends attempted.
    pub attempted: usize,
    /// Recipients whose send failed, with the error.
    pub failures: Vec<(String, Error)>,
}

impl BulkSendReport {
    /// True only if every send succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of successful sends.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }
}

/// Sends mail through Microsoft Graph with managed tokens.
#[derive(Debug)]
pub struct EmailService {
    config: Config,
    tokens: TokenManager,
    graph: GraphClient,
}

impl EmailService {
    /// Creates the service, opening the configured token store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened or the authority host
    /// is not a valid URL.
    pub async fn new(config: Config) -> Result<Self> {
        let store = config.token_store.open(config.token_path.clone()).await?;
        debug!(kind = %config.token_store, path = %config.token_path.display(), "Token store opened");
        Self::with_store(config, store)
    }

    /// Loads configuration from the environment and creates the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the store cannot
    /// be opened.
    pub async fn from_env() -> Result<Self> {
        Self::new(Config::from_env()?).await
    }

    /// Creates the service around an already opened token store.
    ///
    /// # Errors
    ///
    /// Returns an error if the authority host is not a valid URL or the
    /// HTTP client cannot be built.
    pub fn with_store(config: Config, store: Arc<dyn TokenStore>) -> Result<Self> {
        let provider = Provider::microsoft_at(&config.authority_host, &config.tenant_id)?;
        let mut client = OAuthClient::new(&config.client_id, &config.client_secret, provider)?
            .with_scope(&config.scope);
        if let Some(uri) = &config.redirect_uri {
            client = client.with_redirect_uri(uri);
        }

        let tokens = TokenManager::new(&config.tenant_id, client, config.grant_type, store)
            .with_pkce(config.use_pkce);
        let graph = GraphClient::new(&config.graph_base_url)?;

        Ok(Self {
            config,
            tokens,
            graph,
        })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying token manager.
    #[must_use]
    pub const fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    /// True iff tenant id, client id and client secret are all set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    /// Builds the consent URL. Keep the returned request for the exchange.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured`, or `Auth` under the client credentials grant.
    pub fn authorization_url(&self, state: Option<&str>) -> Result<AuthorizationRequest> {
        self.ensure_configured()?;
        Ok(self.tokens.authorization_url(state)?)
    }

    /// Redeems an authorization code and stores the resulting credential.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured`, or `Auth` when the state check or the token
    /// request fails.
    pub async fn exchange_code_for_token(
        &self,
        pending: &AuthorizationRequest,
        code: &str,
        state: &str,
    ) -> Result<Credential> {
        self.ensure_configured()?;
        Ok(self.tokens.exchange_code_for_token(pending, code, state).await?)
    }

    /// Sends a message.
    ///
    /// # Errors
    ///
    /// Returns `NotConfigured`, `MissingSender`, `NoRecipients`, `Auth` or
    /// `SendFailed`.
    pub async fn send_email(&self, message: OutgoingMessage) -> Result<()> {
        self.ensure_configured()?;
        let message = self.with_default_sender(message)?;
        if message.to.is_empty() {
            return Err(Error::NoRecipients);
        }

        let token = self.tokens.access_token().await?;
        self.graph.send(&token, &message).await?;
        info!(recipients = message.to.len(), "Email sent");
        Ok(())
    }

    /// Sends an HTML message to one recipient.
    ///
    /// # Errors
    ///
    /// See [`send_email`](Self::send_email).
    pub async fn send_html_email(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        self.send_email(OutgoingMessage::new(subject, html).to(to).html(true))
            .await
    }

    /// Sends a plain text message to one recipient.
    ///
    /// # Errors
    ///
    /// See [`send_email`](Self::send_email).
    pub async fn send_text_email(&self, to: &str, subject: &str, text: &str) -> Result<()> {
        self.send_email(OutgoingMessage::new(subject, text).to(to))
            .await
    }

    /// Renders `{{key}}` placeholders in the message body and sends it as HTML.
    ///
    /// # Errors
    ///
    /// See [`send_email`](Self::send_email).
    pub async fn send_template_email<S: std::hash::BuildHasher>(
        &self,
        mut message: OutgoingMessage,
        data: &HashMap<String, String, S>,
    ) -> Result<()> {
        message.body = render_template(&message.body, data);
        message.is_html = true;
        self.send_email(message).await
    }

    /// Sends the same message to each recipient separately.
    ///
    /// Every recipient is attempted; failures are collected in the report.
    pub async fn send_bulk_email(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        is_html: bool,
    ) -> BulkSendReport {
        let mut report = BulkSendReport::default();

        for recipient in recipients {
            report.attempted += 1;
            let message = OutgoingMessage::new(subject, body)
                .to(recipient.as_str())
                .html(is_html);
            if let Err(e) = self.send_email(message).await {
                warn!(recipient = %recipient, error = %e, "Bulk send failed for recipient");
                report.failures.push((recipient.clone(), e));
            }
        }

        info!(
            attempted = report.attempted,
            failed = report.failures.len(),
            "Bulk send finished"
        );
        report
    }

    /// Snapshot of the current credential.
    pub async fn token_info(&self) -> TokenInfo {
        self.tokens.token_info().await
    }

    /// Drops the cached credential and deletes the stored record.
    pub async fn clear_tokens(&self) {
        self.tokens.clear_tokens().await;
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.config.is_configured() {
            Ok(())
        } else {
            Err(Error::NotConfigured)
        }
    }

    fn with_default_sender(&self, mut message: OutgoingMessage) -> Result<OutgoingMessage> {
        if message.from.is_none() {
            let address = self
                .config
                .from_address
                .as_ref()
                .ok_or(Error::MissingSender)?;
            message.from = Some(Sender {
                address: address.clone(),
                name: self.config.from_name.clone(),
            });
        }
        match &message.from {
            Some(sender) if !sender.address.trim().is_empty() => Ok(message),
            _ => Err(Error::MissingSender),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;
    use graphmail_oauth::SqliteTokenStore;

    async fn service(config: Config) -> EmailService {
        let store = Arc::new(SqliteTokenStore::in_memory().await.unwrap());
        EmailService::with_store(config, store).unwrap()
    }

    #[tokio::test]
    async fn test_not_configured() {
        let service = service(Config::new("tenant", "", "secret")).await;
        assert!(!service.is_configured());

        let err = service
            .send_text_email("a@contoso.com", "s", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured));
        assert!(matches!(service.authorization_url(None), Err(Error::NotConfigured)));
    }

    #[tokio::test]
    async fn test_missing_sender() {
        let service = service(Config::new("t", "c", "s")).await;
        let err = service
            .send_text_email("a@contoso.com", "s", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingSender));
    }

    #[tokio::test]
    async fn test_no_recipients() {
        let config = Config::new("t", "c", "s").with_sender("noreply@contoso.com", None);
        let service = service(config).await;
        let err = service
            .send_email(OutgoingMessage::new("s", "b"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoRecipients));
    }

    #[tokio::test]
    async fn test_default_sender_applied() {
        let config = Config::new("t", "c", "s")
            .with_sender("noreply@contoso.com", Some("Contoso".to_string()));
        let service = service(config).await;

        let message = service
            .with_default_sender(OutgoingMessage::new("s", "b"))
            .unwrap();
        assert_eq!(
            message.from,
            Some(Sender::new("noreply@contoso.com").with_name("Contoso"))
        );

        let overridden = service
            .with_default_sender(OutgoingMessage::new("s", "b").from(Sender::new("me@contoso.com")))
            .unwrap();
        assert_eq!(overridden.from, Some(Sender::new("me@contoso.com")));
    }

    #[test]
    fn test_bulk_report() {
        let report = BulkSendReport {
            attempted: 3,
            failures: vec![("x@contoso.com".into(), Error::NoRecipients)],
        };
        assert!(!report.all_succeeded());
        assert_eq!(report.succeeded(), 2);
        assert!(BulkSendReport::default().all_succeeded());
    }
}
