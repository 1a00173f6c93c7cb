//! # Two-Tab Simulation
//!
//! Opens two contexts on one file-backed origin and shows a booking made in
//! the first reaching the second, then a clear made in the second reaching
//! the first.
//!
//! ## Usage
//! ```bash
//! # Scratch directory under the system temp dir (default)
//! cargo run -p bookcart-store --bin tab-sim
//!
//! # Explicit data directory
//! cargo run -p bookcart-store --bin tab-sim -- --data-dir ./cart-data
//!
//! # Quieter output
//! RUST_LOG=warn cargo run -p bookcart-store --bin tab-sim
//! ```

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use bookcart_core::{CartState, Money, ServiceOffer};
use bookcart_store::{CartConfig, CartRuntime, StorageBackend};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SYNC_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let args: Vec<String> = env::args().collect();
    let mut data_dir = env::temp_dir().join("bookcart-tab-sim");
    let mut interval_ms: u64 = 100;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--data-dir" | "-d" => {
                if i + 1 < args.len() {
                    data_dir = PathBuf::from(&args[i + 1]);
                    i += 1;
                }
            }
            "--interval" | "-i" => {
                if i + 1 < args.len() {
                    interval_ms = args[i + 1].parse().unwrap_or(100);
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Bookcart Two-Tab Simulation");
                println!();
                println!("Usage: tab-sim [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --data-dir <PATH>  Shared storage directory (default: $TMP/bookcart-tab-sim)");
                println!("  -i, --interval <MS>    Watcher poll interval (default: 100)");
                println!("  -h, --help             Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let mut config = CartConfig::default();
    config.storage.backend = StorageBackend::File;
    config.storage.data_dir = Some(data_dir.clone());
    config.sync.watch_interval_ms = interval_ms;

    println!("Bookcart Two-Tab Simulation");
    println!("===========================");
    println!("Data dir: {}", data_dir.display());
    println!();

    let tab_a = CartRuntime::start(&config)?;
    let tab_b = CartRuntime::start(&config)?;
    print_cart("tab A (opened)", &tab_a.store().state());
    print_cart("tab B (opened)", &tab_b.store().state());

    // Tab A books a service; tab B follows through the watcher
    let mut b_updates = tab_b.store().subscribe();
    let offer = ServiceOffer::new("deep-cleaning", "Deep Cleaning", Money::from_major(35));
    tab_a.store().dispatcher().add_service(&offer, 3)?;
    info!("Tab A booked 3 hours of Deep Cleaning");

    let synced = wait_for_change(&mut b_updates).await;
    print_cart("tab A", &tab_a.store().state());
    print_cart(if synced { "tab B (synced)" } else { "tab B (timed out)" }, &tab_b.store().state());

    // Tab B clears; tab A follows
    let mut a_updates = tab_a.store().subscribe();
    bookcart_store::clear_cart(&tab_b.store().dispatcher());
    info!("Tab B cleared the cart");

    let synced = wait_for_change(&mut a_updates).await;
    print_cart(if synced { "tab A (synced)" } else { "tab A (timed out)" }, &tab_a.store().state());
    print_cart("tab B", &tab_b.store().state());

    tab_a.shutdown();
    tab_b.shutdown();
    Ok(())
}

async fn wait_for_change(rx: &mut watch::Receiver<CartState>) -> bool {
    matches!(
        tokio::time::timeout(SYNC_TIMEOUT, rx.changed()).await,
        Ok(Ok(()))
    )
}

fn print_cart(label: &str, state: &CartState) {
    println!("{}: {} item(s), total {}", label, state.item_count(), state.total);
    for item in &state.items {
        println!(
            "  - {} x{} @ {} ({})",
            item.name, item.quantity, item.price, item.description
        );
    }
}

/// Initializes the tracing subscriber for logging.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,bookcart=debug"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
