//! Marital status breakdown across the endpoint's records.

use std::collections::BTreeMap;

use karte_client::{ClientConfig, FhirClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let client = FhirClient::new(ClientConfig::default())?;
    let patients = client.all_patients().await?;

    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for patient in &patients {
        *counts.entry(patient.marital_status.display()).or_default() += 1;
    }

    for (status, count) in &counts {
        println!("{:<20} {}", status, count);
    }
    Ok(())
}
