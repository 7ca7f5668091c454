//! Connection lifecycle demo: a table-driven client that dials, reports
//! progress through notifications, and tears down over simulated I/O.
//!
//! Run with `cargo run --example connection`.

use std::time::Duration;

use anyhow::{Context, Result};
use hopscotch::{Args, Machine, TransitionTable};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hopscotch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Tables deserialize cleanly, so they can live in config files.
    let table = TransitionTable::from_json(
        r#"{
            "initial": "disconnected",
            "transitions": [
                { "event": "connect",         "from": "disconnected",  "to": "connecting" },
                { "event": "_connectDone",    "from": "connecting",    "to": "connected" },
                { "event": "disconnect",      "from": "connected",     "to": "disconnecting" },
                { "event": "_disconnectDone", "from": "disconnecting", "to": "disconnected" }
            ]
        }"#,
    )?;

    let machine = Machine::builder(table)
        .name("client")
        .hook("onConnecting", |ctx, args| async move {
            let url = args
                .get::<String>(0)
                .context("connect requires a url argument")?;
            info!(url = %url, "dialing");
            tokio::time::sleep(Duration::from_millis(150)).await;
            tokio::spawn(ctx.trigger("_connectDone"));
            Ok(())
        })
        .hook("onDisconnecting", |ctx, _args| async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            tokio::spawn(ctx.trigger("_disconnectDone"));
            Ok(())
        })
        .on_state_change(|state, _args| info!(state = %state, "entered"))
        .on_invalid_transition(|event, state| info!(event = %event, state = %state, "rejected"))
        .build()?;

    machine
        .trigger_with(
            "connect",
            Args::new().with("wss://demo.example/socket".to_string()),
        )
        .await?;
    machine.wait_until_entered("connected").await;

    // A duplicate connect is rejected, not failed.
    machine.trigger("connect").await?;

    machine.trigger("disconnect").await?;
    machine
        .wait_until_entered_timeout("disconnected", Duration::from_secs(1))
        .await?;

    info!(state = %machine.state(), "demo complete");
    Ok(())
}
