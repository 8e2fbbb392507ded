//! Watch PiBaHeAlTas and print the aircraft position once a second.
//!
//! Usage: `cargo run --example poswatch [host:port]`

use std::error::Error;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use psxlink::{Connection, PSX_DEFAULT_PORT};
use tracing::{error, info};

#[derive(Debug, Default, Clone, Copy)]
struct Position {
    pitch: f64,
    bank: f64,
    heading: f64,
    altitude: i64,
    tas: i64,
    latitude: f64,
    longitude: f64,
}

impl Position {
    fn parse(value: &str) -> Option<Self> {
        let fields: Vec<&str> = value.split(';').collect();
        if fields.len() < 7 {
            return None;
        }
        Some(Self {
            pitch: fields[0].parse().ok()?,
            bank: fields[1].parse().ok()?,
            heading: fields[2].parse().ok()?,
            altitude: fields[3].parse().ok()?,
            tas: fields[4].parse().ok()?,
            latitude: fields[5].parse().ok()?,
            longitude: fields[6].parse().ok()?,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let server = std::env::args()
        .nth(1)
        .unwrap_or_else(|| format!("localhost:{}", PSX_DEFAULT_PORT));

    let latest: Arc<Mutex<Option<Position>>> = Arc::new(Mutex::new(None));

    let mut conn = Connection::new(server, "poswatch");
    {
        let latest = latest.clone();
        conn.add_hook("PiBaHeAlTas", move |_ctx, msg| {
            if let Some(pos) = Position::parse(msg.value()) {
                *latest.lock().unwrap() = Some(pos);
            }
        });
    }
    // only relevant behind Router/SwitchPSX
    conn.subscribe("PiBaHeAlTas");

    tokio::spawn(async move {
        loop {
            if let Err(e) = conn.connect().await {
                error!("Couldn't connect: {}", e);
                std::process::exit(1);
            }
            match conn.listen().await {
                Ok(()) => info!("Server ended the session, reconnecting..."),
                Err(e) => info!("Connection lost ({}), reconnecting...", e),
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    });

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let Some(pos) = *latest.lock().unwrap() else {
            continue;
        };
        println!(
            "Pitch: {:.1}  Bank: {:.1}  Heading: {:.1}  Altitude: {:.0}  TAS: {:.2}  Lat: {:.4}  Long: {:.4}",
            pos.pitch.to_degrees(),
            pos.bank.to_degrees(),
            pos.heading.to_degrees(),
            pos.altitude as f64 / 1000.0,
            pos.tas as f64 / 1000.0,
            pos.latitude.to_degrees(),
            pos.longitude.to_degrees(),
        );
    }
}
