//! Orchestration demo: a manager machine that brings two connection clients
//! online concurrently from inside its own enabling hook.
//!
//! Run with `cargo run --example orchestration`.

use std::time::Duration;

use anyhow::{Context, Result};
use hopscotch::{Args, Machine, TransitionRule, TransitionTable};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn connection_table() -> TransitionTable {
    TransitionTable::new(
        "disconnected",
        vec![
            TransitionRule::new("connect", "disconnected", "connecting"),
            TransitionRule::new("_connectDone", "connecting", "connected"),
            TransitionRule::new("disconnect", "connected", "disconnecting"),
            TransitionRule::new("_disconnectDone", "disconnecting", "disconnected"),
        ],
    )
}

fn manager_table() -> TransitionTable {
    TransitionTable::new(
        "disabled",
        vec![
            TransitionRule {
                event: "enable".into(),
                from: "disabled".into(),
                to: "enabling".into(),
            },
            TransitionRule {
                event: "_enableDone".into(),
                from: "enabling".into(),
                to: "enabled".into(),
            },
            TransitionRule {
                event: "disable".into(),
                from: "enabled".into(),
                to: "disabling".into(),
            },
            TransitionRule {
                event: "_disableDone".into(),
                from: "disabling".into(),
                to: "disabled".into(),
            },
        ],
    )
}

fn client(name: &str, dial_time: Duration) -> Result<Machine> {
    let machine = Machine::builder(connection_table())
        .name(name)
        .hook("onConnecting", move |ctx, args| async move {
            let url = args.get::<String>(0).context("client needs a url")?;
            info!(url = %url, "dialing");
            tokio::time::sleep(dial_time).await;
            tokio::spawn(ctx.trigger("_connectDone"));
            Ok(())
        })
        .build()?;
    Ok(machine)
}

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

    let primary = client("primary", Duration::from_millis(120))?;
    let standby = client("standby", Duration::from_millis(200))?;

    let manager = Machine::builder(manager_table())
        .name("manager")
        .hook("onEnabling", {
            let primary = primary.clone();
            let standby = standby.clone();
            move |ctx, _args| {
                let primary = primary.clone();
                let standby = standby.clone();
                async move {
                    primary
                        .trigger_with(
                            "connect",
                            Args::new().with("wss://primary.example".to_string()),
                        )
                        .await?;
                    standby
                        .trigger_with(
                            "connect",
                            Args::new().with("wss://standby.example".to_string()),
                        )
                        .await?;

                    // Both clients must land before the manager reports enabled.
                    futures::future::try_join(
                        primary.wait_until_entered_timeout("connected", Duration::from_secs(2)),
                        standby.wait_until_entered_timeout("connected", Duration::from_secs(2)),
                    )
                    .await?;

                    tokio::spawn(ctx.trigger("_enableDone"));
                    Ok(())
                }
            }
        })
        .on_state_change(|state, _args| info!(state = %state, "manager entered"))
        .build()?;

    manager.trigger("enable").await?;
    manager.wait_until_entered("enabled").await;

    info!(
        manager = %manager.state(),
        primary = %primary.state(),
        standby = %standby.state(),
        "fleet online"
    );
    Ok(())
}
