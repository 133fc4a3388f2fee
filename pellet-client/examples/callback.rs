// Example: asynchronous calls with callbacks
//
// Each `*_async` call returns immediately; the callback runs on a worker
// thread once the response is decoded.
//
//   cargo run --example callback -- http://localhost:8080/

use anyhow::{Context, Result};
use pellet_client::{
    ClientConfig, Consistency, FnCallback, PelletError, ResultCallback, Server, TaskState,
};
use tokio::sync::oneshot;
use tracing::{error, info};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:8080/".to_string());
    let server = Server::connect(ClientConfig::with_url(url))?;

    let mut handles = Vec::new();
    for kb in server.knowledge_bases() {
        let Some(consistency) = kb.get_service::<Consistency>() else {
            continue;
        };
        let name = kb.name().to_string();
        let failed = name.clone();
        handles.push(consistency.consistency_async(FnCallback::new(
            move |consistent: bool| info!("{} consistent: {}", name, consistent),
            move |e: PelletError| error!("{} consistency failed: {}", failed, e),
        )));
    }
    for handle in handles {
        handle.wait()?;
    }

    // A oneshot sender is a callback too; the receiver gets the Result
    let kb = server
        .knowledge_bases()
        .into_iter()
        .find(|kb| kb.has_service::<Consistency>())
        .context("No knowledge base offers consistency checking")?;
    let (tx, rx) = oneshot::channel();
    let handle = kb.require_service::<Consistency>()?.consistency_async(tx);
    let consistent = rx.blocking_recv()??;
    info!("{} consistent: {} ({:?})", kb.name(), consistent, handle.state());

    let handle = kb
        .require_service::<Consistency>()?
        .consistency_async(ResultCallback::new(|result: Result<bool, PelletError>| {
            if let Err(e) = result {
                error!("Consistency failed: {}", e);
            }
        }));
    if handle.wait()? == TaskState::Failed {
        info!("Last call failed");
    }
    Ok(())
}
