use std::time::Duration;

use karte_core::{
    parse_error, parse_observation, parse_observations, parse_patient, parse_patients,
    Observation, Patient,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

/// Read-only client for the Patient/Observation endpoints.
pub struct FhirClient {
    http: reqwest::Client,
    endpoint: String,
}

impl FhirClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(!config.verify_tls)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// All patients the server knows about.
    pub async fn all_patients(&self) -> Result<Vec<Patient>> {
        let body = self.fetch("Patient/").await?;
        Ok(parse_patients(&body)?)
    }

    /// Patients up to the given page.
    pub async fn patient_page(&self, page: u32) -> Result<Vec<Patient>> {
        let body = self.fetch(&format!("Patient/pages/{}", page)).await?;
        Ok(parse_patients(&body)?)
    }

    /// A single patient by UUID.
    pub async fn patient(&self, id: &str) -> Result<Patient> {
        let body = self.fetch(&format!("Patient/{}", id)).await?;
        Ok(parse_patient(&body)?)
    }

    /// A single observation by UUID.
    pub async fn observation(&self, id: &str) -> Result<Observation> {
        let body = self.fetch(&format!("Observation/single/{}", id)).await?;
        Ok(parse_observation(&body)?)
    }

    /// All observations for a patient.
    pub async fn patient_observations(&self, id: &str) -> Result<Vec<Observation>> {
        let body = self.fetch(&format!("Observation/{}", id)).await?;
        Ok(parse_observations(&body)?)
    }

    /// Observations for a patient up to the given page.
    pub async fn patient_observations_page(&self, id: &str, page: u32) -> Result<Vec<Observation>> {
        let body = self
            .fetch(&format!("Observation/pages/{}/{}", page, id))
            .await?;
        Ok(parse_observations(&body)?)
    }

    /// One GET round trip. Surfaces non-success statuses and empty bodies as
    /// transport failures, then checks the body for an embedded
    /// OperationOutcome before handing it to the caller.
    async fn fetch(&self, path: &str) -> Result<String> {
        let url = format!("{}/{}", self.endpoint, path);
        tracing::debug!(url = %url, "fetching resource");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() || body.is_empty() {
            tracing::warn!(url = %url, status = %status, "transport failure");
            return Err(ClientError::TransportFailure {
                status: status.as_u16(),
            });
        }
        if let Some(diagnostics) = parse_error(&body)? {
            tracing::warn!(url = %url, diagnostics = %diagnostics, "remote operation error");
            return Err(ClientError::RemoteOperation(diagnostics));
        }
        Ok(body)
    }
}
