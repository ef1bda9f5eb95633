//! booking_probe - command-line probe for the booking backend
//!
//! Drives the request pipeline against a live backend, persisting the
//! session in a local credential file between invocations.
//!
//! ```text
//! booking_probe get <path> [name=value ...]
//! booking_probe post <path> <json-body>
//! booking_probe login <email> <password>
//! booking_probe logout
//! booking_probe watch <path> <times> [interval-ms]
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_client::credentials::FileStorage;
use booking_client::models::LoginRequest;
use booking_client::{spawn_cleanup_task, ApiClient, ClientConfig, RequestOptions};

const USAGE: &str = "usage: booking_probe <get|post|login|logout|watch> [args...]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" for this crate, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "booking_client=info,booking_probe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env();
    info!(
        base_url = %config.base_url,
        cache_max_entries = config.cache_max_entries,
        cache_ttl_secs = config.cache_ttl_secs,
        "configuration loaded"
    );

    let storage = Arc::new(FileStorage::new(&config.credentials_path));
    let client = ApiClient::builder(config)
        .storage(storage)
        .build()
        .context("failed to build API client")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some((command, rest)) = args.split_first() else {
        bail!(USAGE);
    };

    match command.as_str() {
        "get" => {
            let (path, pairs) = rest.split_first().context("get needs a path")?;
            let value = client.get(path, parse_params(pairs)?).await?;
            print_json(&value)?;
        }
        "post" => {
            let [path, body] = rest else {
                bail!("post needs a path and a JSON body");
            };
            let body: Value = serde_json::from_str(body).context("body is not valid JSON")?;
            let value = client.post(path, body, RequestOptions::new()).await?;
            print_json(&value)?;
        }
        "login" => {
            let [email, password] = rest else {
                bail!("login needs an email and a password");
            };
            let credential = client.login(&LoginRequest::new(email, password)).await?;
            println!("signed in; credential expires at {:?}", credential.expires_at);
        }
        "logout" => {
            client.logout().await?;
            println!("signed out");
        }
        "watch" => watch(&client, rest).await?,
        other => bail!("unknown command {:?}\n{}", other, USAGE),
    }

    Ok(())
}

/// Repeats one read, printing cache statistics after each round.
async fn watch(client: &ApiClient, args: &[String]) -> anyhow::Result<()> {
    let (path, times, interval) = match args {
        [path, times] => (path, times, None),
        [path, times, interval] => (path, times, Some(interval)),
        _ => bail!("watch needs a path, a repeat count and an optional interval in ms"),
    };
    let times: u32 = times.parse().context("repeat count must be a number")?;
    let interval = match interval {
        Some(ms) => Duration::from_millis(ms.parse().context("interval must be a number")?),
        None => Duration::from_secs(1),
    };

    let sweeper = spawn_cleanup_task(client.clone(), client.config().cleanup_interval());

    for round in 1..=times {
        let outcome = client.get(path, RequestOptions::new()).await;
        let stats = client.cache_stats();
        println!(
            "round {}: {} | hits={} misses={} expirations={} hit_rate={:.2}",
            round,
            if outcome.is_ok() { "ok" } else { "failed" },
            stats.hits,
            stats.misses,
            stats.expirations,
            stats.hit_rate()
        );
        if round < times {
            tokio::time::sleep(interval).await;
        }
    }

    sweeper.abort();
    Ok(())
}

fn parse_params(pairs: &[String]) -> anyhow::Result<RequestOptions> {
    pairs.iter().try_fold(RequestOptions::new(), |options, pair| {
        let (name, value) = pair
            .split_once('=')
            .with_context(|| format!("parameter {:?} is not name=value", pair))?;
        Ok(options.param(name, value))
    })
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
