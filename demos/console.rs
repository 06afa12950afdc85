//! Debug console embedding: serves a status page and an upload endpoint
//! until Ctrl-C, then drains in-flight requests.
//!
//! ```text
//! PORTHOLE_PORT=9000 cargo run --example console
//! ```

use porthole::{Method, OverridePolicy, Response, Server, ServerOptions, StatusCode};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let mut options = ServerOptions::load()?;
    options.override_policy = OverridePolicy::PassThrough;

    let mut server = Server::new();

    server.add_handler(Method::GET, "^/$", |_| {
        Some(Response::html("<html><body><p>porthole console</p></body></html>"))
    })?;

    server.add_buffered_handler(Method::POST, "^/upload$", 16 * 1024 * 1024, |request| {
        let size = request.body().map(|b| b.len()).unwrap_or(0);
        Some(Response::text(format!("received {size} bytes\n")))
    })?;

    server.add_async_handler(Method::GET, "^/slow$", |_request, completion| {
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            completion.respond(Response::text("done\n"));
        });
    })?;

    server.set_preflight(|request| {
        if request.path().starts_with("/upload") && request.header("Authorization").is_none() {
            return Some(Response::with_status(StatusCode::Unauthorized));
        }
        None
    });

    server.start_with(options).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    server.stop().await;
    Ok(())
}
