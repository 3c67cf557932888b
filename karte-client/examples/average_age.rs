//! Average patient age across the endpoint's records.

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

    if patients.is_empty() {
        println!("No patients on the endpoint");
        return Ok(());
    }

    let average = patients.iter().map(|p| p.age()).sum::<f64>() / patients.len() as f64;
    println!(
        "Average age across {} patients: {:.1} years",
        patients.len(),
        average
    );
    Ok(())
}
