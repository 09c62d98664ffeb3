//! Subcommand execution
//!
//! Results go to stdout, one line per command. Contention and "not held"
//! outcomes exit with code 1; store and configuration errors propagate.

use std::process::ExitCode;
use std::time::Duration;

use latchkey_core::{Acquisition, LockClient, LockGuard, LockToken};
use rand::Rng;
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::model::config::Command;

const INITIAL_BACKOFF: Duration = Duration::from_millis(50);
const MAX_BACKOFF: Duration = Duration::from_secs(2);

pub async fn run(client: &LockClient, command: Command) -> anyhow::Result<ExitCode> {
    let default_ttl = client.config().default_ttl();
    let ttl_or_default = |ttl_ms: Option<u64>| ttl_ms.map(Duration::from_millis).unwrap_or(default_ttl);

    match command {
        Command::Probe { name, ttl_ms } => {
            let held = client.probe(&name, Some(Duration::from_millis(ttl_ms))).await?;
            println!("{}", if held { "held" } else { "free" });
            Ok(exit_code(held))
        }
        Command::Acquire {
            name,
            ttl_ms,
            extend_on_contention,
        } => {
            let outcome = client
                .acquire(&name, ttl_or_default(ttl_ms), extend_on_contention)
                .await?;
            match outcome {
                Acquisition::Acquired(token) => {
                    println!("{}", token.value());
                    Ok(ExitCode::SUCCESS)
                }
                Acquisition::Contended => {
                    println!("contended");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Command::Release { name, token } => {
            let token = rebuild_token(client, &name, token, default_ttl);
            let released = client.release(&token).await?;
            println!("{}", if released { "released" } else { "not-held" });
            Ok(exit_code(released))
        }
        Command::ForceRelease { name } => {
            let removed = client.force_release(&name).await?;
            println!("{}", if removed { "released" } else { "absent" });
            Ok(ExitCode::SUCCESS)
        }
        Command::Extend {
            name,
            token,
            ttl_ms,
        } => {
            let ttl = ttl_or_default(ttl_ms);
            let token = rebuild_token(client, &name, token, ttl);
            let extended = client.extend(&token, ttl).await?;
            println!("{}", if extended { "extended" } else { "not-held" });
            Ok(exit_code(extended))
        }
        Command::Hold {
            name,
            ttl_ms,
            hold_ms,
            wait_ms,
        } => {
            let ttl = ttl_or_default(ttl_ms);
            let Some(guard) =
                acquire_with_backoff(client, &name, ttl, Duration::from_millis(wait_ms)).await?
            else {
                println!("contended");
                return Ok(ExitCode::FAILURE);
            };

            println!("{}", guard.token().value());
            sleep(Duration::from_millis(hold_ms)).await;

            guard.ensure_held()?;
            let released = guard.release().await?;
            info!(name = %name, released, "Hold finished");
            println!("{}", if released { "released" } else { "not-held" });
            Ok(exit_code(released))
        }
    }
}

fn exit_code(ok: bool) -> ExitCode {
    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn rebuild_token(client: &LockClient, name: &str, value: String, ttl: Duration) -> LockToken {
    LockToken::from_parts(name, client.key_for(name), value, ttl)
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Retry `lock_scoped` with jittered exponential backoff until `wait` elapses
async fn acquire_with_backoff(
    client: &LockClient,
    name: &str,
    ttl: Duration,
    wait: Duration,
) -> anyhow::Result<Option<LockGuard>> {
    let deadline = Instant::now() + wait;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        if let Some(guard) = client.lock_scoped(name, ttl).await? {
            return Ok(Some(guard));
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }

        let jitter_ms = rand::rng().random_range(0..=millis(backoff) / 2);
        let delay = (backoff + Duration::from_millis(jitter_ms)).min(deadline - now);
        debug!(name = %name, delay_ms = millis(delay), "Lock contended, backing off");
        sleep(delay).await;

        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
