pub mod api;
pub mod tls;
pub mod websocket;

use crate::cli::Args;
use crate::error::BoxError;
use crate::shell::Shell;
use log::{ info, warn };
use url::form_urlencoded;

pub struct Server {
    shell: Shell,
    args: Args,
}

impl Server {
    pub fn new(shell: Shell, args: Args) -> Self {
        if args.required_api_key().is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }
        Self { shell, args }
    }

    pub async fn run(&self) -> Result<(), BoxError> {
        self.start_http_server().await?;
        self.start_ws_server().await?;
        Ok(())
    }

    async fn start_http_server(&self) -> Result<(), BoxError> {
        let state = api::AppState::new(
            self.shell.clone(),
            self.args.required_api_key(),
            self.args.max_upload_bytes
        );
        api::start_http_server(&self.args.http_addr, state, &self.args).await
    }

    async fn start_ws_server(&self) -> Result<(), BoxError> {
        websocket::start_ws_server(
            &self.args.server_addr,
            self.shell.clone(),
            self.args.required_api_key(),
            &self.args
        ).await
    }
}

/// Key presented by a client: the `X-API-Key` header wins over the
/// `api_key` query parameter.
pub(crate) fn provided_api_key(header: Option<&str>, query: Option<&str>) -> Option<String> {
    if let Some(value) = header {
        return Some(value.to_string());
    }
    form_urlencoded
        ::parse(query.unwrap_or("").as_bytes())
        .find(|(key, _)| key == "api_key")
        .map(|(_, value)| value.into_owned())
}

pub(crate) fn is_authorized(required: Option<&str>, provided: Option<&str>) -> bool {
    match required {
        Some(key) => provided == Some(key),
        None => true,
    }
}
