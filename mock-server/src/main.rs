use std::sync::Arc;

use mock_server::{Db, Store};
use tokio::{net::TcpListener, sync::RwLock};

/// `PORT` picks the port (default 3000). `MOCK_SEED` may point at a JSON file
/// shaped like `{"status/lead": [{"label": "Won"}], ...}` to preload
/// collections.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");

    let mut store = Store::default();
    if let Ok(path) = std::env::var("MOCK_SEED") {
        let raw = std::fs::read_to_string(&path)?;
        let seed: std::collections::HashMap<String, Vec<serde_json::Value>> =
            serde_json::from_str(&raw)?;
        for (collection, records) in seed {
            store.seed(&collection, records);
        }
        println!("seeded from {path}");
    }
    let db: Db = Arc::new(RwLock::new(store));

    let listener = TcpListener::bind(&addr).await?;
    println!("listening on http://{addr}{}", mock_server::API_PREFIX);
    mock_server::run_with(listener, db).await?;
    Ok(())
}
