//! Simple Cast device discovery that outputs JSON for scripting
//!
//! Usage: cargo run -p mp3cast-discovery --example discover_json [timeout-secs]

use cast_discovery::get_with_timeout;
use serde::Serialize;
use std::time::Duration;

#[derive(Serialize)]
struct CastDeviceInfo {
    id: String,
    name: String,
    ip_address: String,
    port: u16,
    model_name: String,
}

fn main() -> Result<(), serde_json::Error> {
    let timeout = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let devices: Vec<CastDeviceInfo> = get_with_timeout(Duration::from_secs(timeout))
        .into_iter()
        .map(|d| CastDeviceInfo {
            id: d.id,
            name: d.name,
            ip_address: d.ip_address,
            port: d.port,
            model_name: d.model_name,
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}
