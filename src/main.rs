use std::error::Error;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::oneshot;
use tracing::info;

use wardline::api::rest::RestApi;
use wardline::config::{load_config, Config};
use wardline::error::WardError;
use wardline::events::BroadcastSink;
use wardline::inventory::BedInventory;
use wardline::opd::OpdQueue;
use wardline::reservation::sweeper::ExpirySweeper;
use wardline::reservation::ReservationLedger;

fn seed_hospitals(inventory: &BedInventory, config: &Config) -> Result<(), WardError> {
    for hospital in &config.hospitals {
        inventory.register_hospital(&hospital.id, &hospital.name);
        for room in &hospital.rooms {
            inventory.register_room(&hospital.id, room.room_type, room.price, &room.beds)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().init();

    let config = load_config(Path::new("config.yaml"))?;
    info!(
        hospitals = config.hospitals.len(),
        "starting wardline with seeded hospitals"
    );

    // The broadcast sink is where an external socket/pub-sub layer attaches.
    let events = Arc::new(BroadcastSink::new(256));
    let inventory = Arc::new(BedInventory::new(events.clone()));
    seed_hospitals(&inventory, &config)?;

    let ledger = Arc::new(ReservationLedger::new(
        Arc::clone(&inventory),
        events.clone(),
        chrono::Duration::minutes(config.sweeper.hold_ttl_mins),
    ));
    let opd = Arc::new(OpdQueue::new(events.clone()));
    let api = RestApi::new(Arc::clone(&ledger), Arc::clone(&opd));

    let sweeper = ExpirySweeper::new(
        Arc::clone(&ledger),
        Duration::from_secs(config.sweeper.interval_secs),
    );
    let (sweeper_shutdown_tx, sweeper_shutdown_rx) = oneshot::channel();
    let sweeper_handle = tokio::spawn(sweeper.run(sweeper_shutdown_rx));

    let addr = SocketAddr::new(config.api.host.parse()?, config.api.port);
    info!(%addr, "starting server");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let routes = api.routes();
    let (_, server) = warp::serve(routes).bind_with_graceful_shutdown(addr, async move {
        shutdown_rx.await.ok();
        info!("shutting down server");
    });
    let server_handle = tokio::spawn(server);

    signal::ctrl_c().await?;
    info!("ctrl-c received, starting graceful shutdown");

    shutdown_tx.send(()).ok();
    sweeper_shutdown_tx.send(()).ok();
    server_handle.await?;
    sweeper_handle.await?;

    info!("shutdown complete");
    Ok(())
}
