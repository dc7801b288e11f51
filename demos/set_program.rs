use guntamatic_biostar::{BiostarClient, Program, TrafficLogMode};
use std::env;

#[tokio::main]
async fn main() -> guntamatic_biostar::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let usage = "usage: set_program <host> <api-key> <write-key> <off|normal|heat|lower> [--log]";
    let host = args.get(1).expect(usage);
    let api_key = args.get(2).expect(usage);
    let write_key = args.get(3).expect(usage);
    let program = args
        .get(4)
        .and_then(|name| Program::ALL.into_iter().find(|p| p.as_str() == name.as_str()))
        .expect(usage);

    let mut builder = BiostarClient::builder(host, api_key).write_key(write_key);

    if args.iter().any(|a| a == "--log") {
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = format!("logs/set_program_{ts}.ndjson");
        std::fs::create_dir_all("logs").ok();
        println!("Logging requests to {path}");
        builder = builder.traffic_log(TrafficLogMode::Full, &path);
    }

    let client = builder.build();

    println!("Setting program to {program} on {host}...");
    client.set_program(program).await?;
    println!("Acknowledged. Verifying...");

    let data = client.refresh_data().await?;
    match data.snapshot.current_program() {
        Some(active) => println!("Device now reports program: {active}"),
        None => println!("Device does not expose a program sensor; check manually"),
    }
    Ok(())
}
