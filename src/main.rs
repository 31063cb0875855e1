use peercache::api;
use peercache::group::loader_fn;
use peercache::peer::server;
use peercache::{PeerPool, Registry};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} --bind <host:port> [--peers <a,b,c>] [--api <host:port>]", args[0]);
        eprintln!("Example: {} --bind 127.0.0.1:8001", args[0]);
        eprintln!(
            "Example: {} --bind 127.0.0.1:8001 --peers 127.0.0.1:8001,127.0.0.1:8002 --api 127.0.0.1:9999",
            args[0]
        );
        std::process::exit(1);
    }

    let mut bind_addr: Option<String> = None;
    let mut peer_addrs: Vec<String> = vec![];
    let mut api_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--bind" => {
                bind_addr = Some(args[i + 1].clone());
                i += 2;
            }
            "--peers" => {
                peer_addrs = args[i + 1]
                    .split(',')
                    .map(|addr| addr.trim().to_string())
                    .filter(|addr| !addr.is_empty())
                    .collect();
                i += 2;
            }
            "--api" => {
                api_addr = Some(args[i + 1].clone());
                i += 2;
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_addr.expect("--bind is required");
    if peer_addrs.is_empty() {
        peer_addrs.push(bind_addr.clone());
    }

    tracing::info!("Starting cache node on {}", bind_addr);
    tracing::info!("Peer set: {:?}", peer_addrs);

    // 1. Peer picker over the configured membership:
    let replicas = std::env::var("RING_REPLICAS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .unwrap_or(0);
    let pool = Arc::new(PeerPool::new(&bind_addr, replicas, None));
    pool.set_peers(&peer_addrs);

    // 2. Groups:
    let registry = Registry::new();
    registry.register_picker(pool);

    let cache_budget = std::env::var("CACHE_BUDGET_BYTES")
        .ok()
        .and_then(|value| value.parse::<i64>().ok())
        .unwrap_or(2 << 20);

    // Demo group backed by an in-process table standing in for a slow
    // upstream database.
    registry.new_group(
        "scores",
        cache_budget,
        loader_fn(|key: String| async move {
            tracing::info!("[origin] looking up {}", key);
            let db: HashMap<&str, &str> =
                [("Tom", "630"), ("Jack", "589"), ("Sam", "567")].into();
            match db.get(key.as_str()) {
                Some(value) => Ok(value.as_bytes().to_vec()),
                None => Err(anyhow::anyhow!("{} not found in origin", key)),
            }
        }),
    );

    // 3. Optional front-end API listener:
    if let Some(api_addr) = api_addr {
        let app = api::router(Arc::clone(&registry));
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        tracing::info!("API server listening on {}", api_addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server failed: {}", e);
            }
        });
    }

    // 4. Peer RPC server:
    let app = server::router(registry);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Peer RPC server listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
