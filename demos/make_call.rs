use silent::SilentFactory;
use webphone::{CallState, Client, ClientConfig, ConnectionStatus, Event};

#[path = "silent.rs"]
mod silent;

fn config() -> Result<ClientConfig, std::env::VarError> {
    Ok(ClientConfig::new(
        std::env::var("WEBPHONE_URI")?,
        std::env::var("WEBPHONE_USER")?,
        std::env::var("WEBPHONE_PASSWORD")?,
        std::env::var("WEBPHONE_SERVER")?,
    ))
}

/// Usage: `make_call <target>`, hang up with ctrl-c
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let target = std::env::args().nth(1).ok_or("missing call target")?;

    let (client, mut events) = Client::new(SilentFactory);
    client.connect(config()?).await?;

    // Wait for the registration
    loop {
        match events.recv().await {
            Some(Event::Connection(ConnectionStatus::Registered)) => break,
            Some(Event::Connection(ConnectionStatus::Error)) | None => {
                return Err("registration failed".into());
            }
            Some(_) => {}
        }
    }

    let session = client.call(target).await?;
    println!("calling {}", session.remote_identity);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                println!("{event:?}");

                if let Event::Call(event) = event {
                    if event.state == CallState::Idle {
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if let Err(e) = client.hangup().await {
                    println!("{e}");
                }
            }
        }
    }

    client.disconnect().await?;

    Ok(())
}
