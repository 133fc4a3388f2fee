//! Pellet Server Explorer
//!
//! Runs discovery against a server and prints its knowledge bases and the
//! capabilities each one advertises.
//!
//! Usage: `pellet-explore [URL] [METHOD]`. Unset arguments fall back to the
//! `PELLET_*` environment variables, then to the defaults. Set
//! `PELLET_LOG_DIR` to also write daily log files there.

use anyhow::{Context, Result};
use pellet_client::{logging, mime, parse_method, ClientConfig, Server, Service};
use std::sync::Arc;
use tracing::error;

const ENV_LOG_DIR: &str = "PELLET_LOG_DIR";

fn main() {
    match std::env::var(ENV_LOG_DIR) {
        Ok(dir) => {
            if let Err(e) = logging::init_logging(&dir, "pellet-explore") {
                eprintln!("warning: file logging disabled: {:#}", e);
                logging::init_console_logging();
            }
        }
        Err(_) => logging::init_console_logging(),
    }

    if let Err(e) = run() {
        error!("{:#}", e);
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let mut config = ClientConfig::from_env().context("Invalid PELLET_* environment")?;
    if let Some(url) = args.next() {
        config.url = url;
    }
    if let Some(method) = args.next() {
        config.preferred_method = parse_method(&method)?;
    }

    let url = config.url.clone();
    let server = Server::connect(config).with_context(|| format!("Discovery of {} failed", url))?;

    println!("Server {}", server.endpoint().url());
    for (key, value) in server.info() {
        println!("  {}: {}", key, value);
    }

    let services = server.services();
    if !services.is_empty() {
        println!();
        println!("Server services:");
        print_services(&services);
    }

    for name in server.list_knowledge_bases() {
        let Some(kb) = server.get_knowledge_base(&name) else {
            continue;
        };
        println!();
        match kb.location() {
            Some(location) => println!("Knowledge base {} ({})", name, location),
            None => println!("Knowledge base {}", name),
        }
        print_services(&kb.services());
    }
    Ok(())
}

fn print_services(services: &[Arc<dyn Service>]) {
    for service in services {
        let endpoint = service.endpoint();
        let methods: Vec<&str> = endpoint.methods().iter().map(|m| m.as_str()).collect();
        println!(
            "  {:<14} {} [{}] {}",
            service.name(),
            endpoint.url(),
            methods.join(","),
            mime::accept_header(service.accepted_types())
        );
    }
}
