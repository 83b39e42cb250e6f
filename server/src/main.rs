use anyhow::Context;
use log::info;
use server::{AppContext, Config, router};
use tokio::{net::TcpListener, signal};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Config::from_env()?;
    let ctx = AppContext::load(&config)?;
    let app = router(
        ctx,
        &config.cors_origin,
        &config.static_dir,
        config.max_body_bytes,
    )
        .with_context(|| format!("invalid CORS_ORIGIN {:?}", config.cors_origin))?;

    let addr = config.addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("listening at {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if signal::ctrl_c().await.is_ok() {
                info!("received SIGTERM");
            }
        })
        .await
        .context("failed to run http server")
}
