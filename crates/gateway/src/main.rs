use template_gateway::server;
use template_gateway_core::config::{load_dotenv, ConfigLoader, ServiceConfig, WebhookConfig};
use template_gateway_core::telemetry::init_tracing;
use tracing::error;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    load_dotenv();
    init_tracing();

    let service = load_config::<ServiceConfig>()?;
    let webhook = load_config::<WebhookConfig>()?;

    server::run(service, webhook).await
}

fn load_config<T: ConfigLoader>() -> std::io::Result<T> {
    match T::from_env().and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => Ok(config),
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
        }
    }
}
