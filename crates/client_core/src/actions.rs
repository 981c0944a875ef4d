use reqwest::{
    header::{COOKIE, SET_COOKIE},
    redirect::Policy,
    Client, StatusCode,
};
use shared::protocol::{SendMessageForm, SetNameForm};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{config::ClientSettings, cookies::parse_set_cookie, identity::IdentityResolver};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(StatusCode),
    #[error("message is empty")]
    EmptyMessage,
    #[error("display name is empty")]
    EmptyName,
}

/// Outbound form posts the chat page makes besides the stream.
pub struct ChatActions {
    http: Client,
    set_name_url: Url,
    send_url: Url,
    identity: IdentityResolver,
}

impl ChatActions {
    pub fn new(settings: &ClientSettings, identity: IdentityResolver) -> Result<Self, ActionError> {
        // `/setname` sets its cookie on the redirect response itself.
        let http = Client::builder().redirect(Policy::none()).build()?;
        Self::with_client(http, settings, identity)
    }

    pub fn with_client(
        http: Client,
        settings: &ClientSettings,
        identity: IdentityResolver,
    ) -> Result<Self, ActionError> {
        Ok(Self {
            http,
            set_name_url: settings.endpoint(&settings.set_name_path)?,
            send_url: settings.endpoint(&settings.send_path)?,
            identity,
        })
    }

    /// Picks a display name; the server answers with the `sender-name` cookie.
    pub async fn set_name(&self, name: &str) -> Result<(), ActionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ActionError::EmptyName);
        }
        let response = self
            .http
            .post(self.set_name_url.clone())
            .header(COOKIE, self.identity.cookie_header())
            .form(&SetNameForm {
                name: name.to_string(),
            })
            .send()
            .await?;
        self.ingest_cookies(&response);
        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(ActionError::Status(status));
        }
        info!(name, "display name submitted");
        Ok(())
    }

    pub async fn send_message(&self, contents: &str) -> Result<(), ActionError> {
        if contents.trim().is_empty() {
            return Err(ActionError::EmptyMessage);
        }
        let response = self
            .http
            .post(self.send_url.clone())
            .header(COOKIE, self.identity.cookie_header())
            .form(&SendMessageForm {
                contents: contents.to_string(),
            })
            .send()
            .await?;
        self.ingest_cookies(&response);
        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Status(status));
        }
        Ok(())
    }

    fn ingest_cookies(&self, response: &reqwest::Response) {
        for header in response.headers().get_all(SET_COOKIE) {
            let Some((name, value)) = header.to_str().ok().and_then(parse_set_cookie) else {
                continue;
            };
            if let Err(err) = self.identity.cookies().set_cookie(&name, &value) {
                warn!(cookie = %name, "failed to store server cookie: {err:#}");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/actions_tests.rs"]
mod tests;
