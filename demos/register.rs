use silent::SilentFactory;
use webphone::{Client, ClientConfig, ConnectionStatus, Event};

#[path = "silent.rs"]
mod silent;

/// Reads the account from `WEBPHONE_URI`, `WEBPHONE_USER`, `WEBPHONE_PASSWORD` and `WEBPHONE_SERVER`
fn config() -> Result<ClientConfig, std::env::VarError> {
    Ok(ClientConfig::new(
        std::env::var("WEBPHONE_URI")?,
        std::env::var("WEBPHONE_USER")?,
        std::env::var("WEBPHONE_PASSWORD")?,
        std::env::var("WEBPHONE_SERVER")?,
    ))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let (client, mut events) = Client::new(SilentFactory);

    client.connect(config()?).await?;

    while let Some(event) = events.recv().await {
        println!("{event:?}");

        match event {
            Event::Connection(ConnectionStatus::Registered) => break,
            Event::Connection(ConnectionStatus::Error) => return Err("registration failed".into()),
            _ => {}
        }
    }

    // unregister
    client.disconnect().await?;

    Ok(())
}
