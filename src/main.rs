//! Release Deploy Agent - GitHub release 部署代理
//!
//! Usage:
//! - Normal mode: `release-deploy-agent`
//! - With custom port: `release-deploy-agent --port 19999`
//! - Development mode (no signature check): `release-deploy-agent --dev`

use release_deploy_agent::RuntimeConfig;

/// 解析命令行参数
fn parse_args() -> RuntimeConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = RuntimeConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" if i + 1 < args.len() => {
                config.port_override = args[i + 1].parse().ok();
                if config.port_override.is_none() {
                    eprintln!("Ignoring invalid port: {}", args[i + 1]);
                }
                i += 2;
            }
            "--dev" => {
                config.dev_mode = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    config
}

fn print_help() {
    println!("Release Deploy Agent - GitHub release 部署代理");
    println!();
    println!("USAGE:");
    println!("    release-deploy-agent [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    --port <PORT>    Override the listening port");
    println!("    --dev            Development mode, skip webhook signature verification");
    println!("    -h, --help       Print help information");
    println!();
    println!("ENVIRONMENT:");
    println!("    DEPLOY_AGENT_ASSETS_DIR        Release staging root (required)");
    println!("    DEPLOY_AGENT_SECRET_TOKEN      Webhook secret (required unless --dev)");
    println!("    DEPLOY_AGENT_GITHUB_TOKEN      GitHub access token (required)");
    println!("    DEPLOY_AGENT_CONFIG_FILE       Repository config JSON (required)");
    println!("    DEPLOY_AGENT_NOTIFICATION_WEBHOOK_URL  Deployment notification webhook");
}

fn main() {
    let config = parse_args();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = rt.block_on(release_deploy_agent::init_and_run_agent_with_config(config)) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
