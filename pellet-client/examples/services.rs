// Example: synchronous calls against one knowledge base
//
//   cargo run --example services -- http://localhost:8080/ wine

use anyhow::{Context, Result};
use pellet_client::{
    ClientConfig, Classify, Consistency, Explain, QueryResult, Query, Search, Server,
};
use tracing::{info, warn};

const OWL_THING: &str = "http://www.w3.org/2002/07/owl#Thing";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let url = args.next().unwrap_or_else(|| "http://localhost:8080/".to_string());
    let kb_name = args.next().unwrap_or_else(|| "wine".to_string());

    let server = Server::connect(ClientConfig::with_url(url))?;
    let kb = server
        .get_knowledge_base(&kb_name)
        .with_context(|| format!("Server has no knowledge base named {}", kb_name))?;

    let consistency = kb.require_service::<Consistency>()?;
    info!("{} consistent: {}", kb_name, consistency.consistency()?);

    if let Some(classify) = kb.get_service::<Classify>() {
        let graph = classify.classify()?;
        info!(
            "Classification: {} bytes of {}",
            graph.document.len(),
            graph.media_type
        );
    }

    if let Some(query) = kb.get_service::<Query>() {
        match query.query("SELECT ?c WHERE { ?c a <http://www.w3.org/2002/07/owl#Class> } LIMIT 10")? {
            QueryResult::Bindings(results) => {
                for solution in &results.solutions {
                    info!("  {:?}", solution.get("c"));
                }
            }
            QueryResult::Graph(graph) => info!("Query returned a graph: {}", graph.media_type),
        }
    }

    if let Some(explain) = kb.get_service::<Explain>() {
        match explain.unsat(OWL_THING) {
            Ok(graph) => info!("Explanation: {} bytes", graph.document.len()),
            Err(e) => warn!("Explanation failed: {}", e),
        }
    }

    if let Some(search) = kb.get_service::<Search>() {
        for hit in search.search("wine")? {
            info!("  {}", hit);
        }
    }
    Ok(())
}
