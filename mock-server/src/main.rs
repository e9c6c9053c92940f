use tokio::net::UnixListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::var("SNAPD_MOCK_SOCKET").unwrap_or_else(|_| "./snapd.socket".to_string());

    // A socket left behind by a previous run makes bind fail with EADDRINUSE.
    match tokio::fs::remove_file(&path).await {
        Err(err) if err.kind() != std::io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }

    let listener = UnixListener::bind(&path)?;
    tracing::info!(%path, "listening");
    mock_server::run(listener).await
}
