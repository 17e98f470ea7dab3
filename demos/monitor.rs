use melview::MelviewClient;
use std::env;
use std::time::Duration;

#[tokio::main]
async fn main() -> melview::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let (Some(user), Some(pass)) = (args.get(1), args.get(2)) else {
        eprintln!("usage: monitor <email> <password> [state-file]");
        std::process::exit(2);
    };

    let mut builder = MelviewClient::builder(user, pass)
        .min_refresh(Duration::from_secs(30))
        .on_change(|event| {
            for (property, value) in &event.current {
                let before = event
                    .previous
                    .get(property)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "-".into());
                println!("[unit {}] {property}: {before} -> {value}", event.unit_id);
            }
        });
    if let Some(path) = args.get(3) {
        builder = builder.state_file(path);
    }

    let mut client = builder.build();

    println!("Connecting...");
    client.connect(true).await?;
    println!("Connected: {}", client.unit_names().join(", "));

    loop {
        for index in 0..client.units().len() {
            match client.current_state(index).await {
                Ok(state) => println!(
                    "[{}] power: {} | mode: {} | set: {}\u{00b0}C | room: {}\u{00b0}C | fan: {}",
                    client.unit(index)?.name(),
                    state.power.as_deref().unwrap_or("?"),
                    state.mode.as_deref().unwrap_or("?"),
                    state.set_temperature.map(|t| t.to_string()).unwrap_or_default(),
                    state.room_temperature.map(|t| t.to_string()).unwrap_or_default(),
                    state.fan_speed.as_deref().unwrap_or("?"),
                ),
                Err(melview::Error::Authentication(e)) => {
                    eprintln!("Session lost ({e}), reconnecting...");
                    client.connect(false).await?;
                }
                Err(e) => eprintln!("Poll error: {e}"),
            }
        }
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}
