//! Utility to verify Evolution API credentials by sending the diagnostic message.
//!
//! Usage: `check_evolution [--notify-sample]`. With `--notify-sample`, also
//! sends a sample lead notification to the configured recipient.

use urolaser_leads::config::Config;
use urolaser_leads::core::models::LeadFormData;
use urolaser_leads::integrations::evolution_client::{EvolutionApiService, TEST_RECIPIENT};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urolaser_leads=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let mut service = EvolutionApiService::new(config.evolution.clone());
    if let Some(recipient) = config.lead_notify_recipient {
        service = service.with_default_recipient(recipient);
    }

    println!("Instance: {}", config.evolution.instance_name);
    println!("Config complete: {}", service.validate_config());

    let connected = service.test_connection().await;
    println!("Test message to {}: {}", TEST_RECIPIENT, if connected { "OK" } else { "FAILED" });

    if std::env::args().any(|arg| arg == "--notify-sample") {
        let sample = LeadFormData {
            name: "Lead de Teste".to_string(),
            email: "teste@urolaser.com.br".to_string(),
            whatsapp: "(12) 99124-6207".to_string(),
        };
        match service.send_lead_notification(&sample, None).await {
            Ok(response) => println!(
                "Sample notification to {}: {} ({})",
                service.default_recipient(),
                response.key.id,
                response.status
            ),
            Err(e) => println!("Sample notification failed: {}", e),
        }
    }

    if !connected {
        anyhow::bail!("Evolution API connection test failed");
    }

    Ok(())
}
