//! `cmdloop doctor`: Diagnose configuration, provider and executor.

use cmdloop_config::{AppConfig, ExecutorKind};
use cmdloop_core::CommandExecutor;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 cmdloop doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file, using defaults — run `cmdloop config init`");
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  Fix the config file before running further checks.");
            return Ok(());
        }
    };

    if config.has_api_key() || config.default_provider == "ollama" {
        println!("  ✅ Model credentials configured ({})", config.default_provider);
    } else {
        println!("  ⚠️  No API key configured — set OPENROUTER_API_KEY or add api_key to config.toml");
        issues += 1;
    }

    let router = cmdloop_providers::router::build_from_config(&config);
    match router.default() {
        Some(provider) => match provider.health_check().await {
            Ok(true) => println!("  ✅ Provider {} reachable", provider.name()),
            Ok(false) => {
                println!("  ⚠️  Provider {} answered but rejected the health check", provider.name());
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Provider {} unreachable: {e}", provider.name());
                issues += 1;
            }
        },
        None => {
            println!("  ❌ No default provider");
            issues += 1;
        }
    }

    match cmdloop_executor::build_from_config(&config.executor) {
        Some(executor) if executor.is_available().await => {
            println!("  ✅ Executor {} available", executor.name());
        }
        Some(executor) => {
            match config.executor.kind {
                ExecutorKind::Remote => println!(
                    "  ⚠️  Remote executor not responding at {}",
                    config.executor.remote_url
                ),
                _ => println!("  ⚠️  Executor {} is offline", executor.name()),
            }
            issues += 1;
        }
        None => println!("  ℹ️  No executor configured (propose-only use)"),
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
