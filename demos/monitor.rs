use guntamatic_biostar::{BiostarClient, UpdateCoordinator};
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> guntamatic_biostar::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).expect("usage: monitor <host> <api-key>");
    let api_key = args.get(2).expect("usage: monitor <host> <api-key>");

    let client = BiostarClient::builder(host, api_key).build();

    println!("Probing {host}...");
    let generation = client.probe().await?;
    println!("Device speaks the {generation:?} API");

    let coordinator = UpdateCoordinator::builder(client)
        .on_snapshot(|snapshot| {
            println!("--- {} sensors ---", snapshot.len());
            for (key, record) in snapshot.iter() {
                match &record.unit {
                    Some(unit) => println!("{key}: {} {unit}", record.value),
                    None => println!("{key}: {}", record.value),
                }
            }
            if let Some(program) = snapshot.current_program() {
                println!("Active program (best guess): {program}");
            }
        })
        .on_update_failed(|err| {
            eprintln!("Update failed: {err}");
        })
        .build();

    coordinator.start();

    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
        if let Some(meta) = coordinator.device_meta() {
            println!(
                "Device: {} (fw {}, sn {})",
                meta.model.as_deref().unwrap_or("?"),
                meta.sw_version.as_deref().unwrap_or("?"),
                meta.serial_number.as_deref().unwrap_or("?"),
            );
        }
    }
}
