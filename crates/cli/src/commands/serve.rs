//! `cmdloop serve`: Start the HTTP gateway.

use cmdloop_config::AppConfig;

pub async fn run(port_override: Option<u16>, host_override: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    if let Some(host) = host_override {
        config.gateway.host = host;
    }

    println!("🔁 cmdloop gateway");
    println!("   Listening: http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Provider:  {} ({})", config.default_provider, config.default_model);
    println!("   Executor:  {:?}", config.executor.kind);
    println!(
        "   Limit:     {}",
        if config.agent.unlimited_iterations {
            format!("unlimited (ceiling {})", config.agent.safety_ceiling)
        } else {
            config.agent.max_iterations.to_string()
        }
    );

    cmdloop_gateway::start(config).await?;

    Ok(())
}
