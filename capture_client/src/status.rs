//! Remote check whether the server holds a usable model bundle.
//!
use anyhow::{Context, Result};
use common::protocol::{ModelStatus, MODEL_STATUS_PATH};
use reqwest::{Client, Url};

/// Answers whether a usable model bundle is available.
#[allow(async_fn_in_trait)]
pub trait AvailabilityCheck {
    async fn check(&self) -> Result<ModelStatus>;
}

/// Availability check against the model server.
pub struct HttpAvailability {
    client: Client,
    url: Url,
}

impl HttpAvailability {
    pub fn new(client: Client, server: &Url) -> Result<Self> {
        let url = server
            .join(MODEL_STATUS_PATH)
            .with_context(|| format!("invalid server URL {}", server))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl AvailabilityCheck for HttpAvailability {
    async fn check(&self) -> Result<ModelStatus> {
        log::debug!("Checking model status at {}", &self.url);
        let status = self
            .client
            .get(self.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json::<ModelStatus>()
            .await?;

        Ok(status)
    }
}
