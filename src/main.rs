use focus_widget::display::{format_stopwatch, spawn_ticker};
use focus_widget::handlers::dispatch;
use focus_widget::persist::PersistFailure;
use focus_widget::{detect_backend, Command, Session, SystemClock, TimeSource, WidgetConfig};
use serde_json::json;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = WidgetConfig::from_env();
    let clock: Arc<dyn TimeSource> = Arc::new(SystemClock::new());
    let backend = detect_backend(&config, clock.clone()).await?;
    let mut session = Session::start(backend, clock).await;
    let mut failures = session.engine.subscribe_failures();
    let mut ticker = start_ticker(&session, &config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let reply = match Command::parse(&line) {
            Ok(None) => continue,
            Ok(Some(Command::Quit)) => break,
            Ok(Some(command)) => {
                let reinitializes = matches!(command, Command::Import(_) | Command::ResetStorage);
                let reply = dispatch(&mut session, command).await;
                if reinitializes {
                    failures = session.engine.subscribe_failures();
                    if let Some(handle) = ticker.take() {
                        handle.abort();
                    }
                    ticker = start_ticker(&session, &config);
                }
                reply
            }
            Err(err) => Err(err),
        };

        let value = reply.unwrap_or_else(|err| {
            warn!("command failed: {err}");
            json!({ "error": err.to_string() })
        });
        let mut out = serde_json::to_vec(&value)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;

        report_failures(&mut failures);
    }

    if let Some(handle) = ticker {
        handle.abort();
    }
    session.shutdown().await;
    report_failures(&mut failures);
    Ok(())
}

fn report_failures(failures: &mut broadcast::Receiver<PersistFailure>) {
    loop {
        match failures.try_recv() {
            Ok(failure) => warn!(
                "stopwatch state not saved ({:?}), session continues: {}",
                failure.op, failure.message
            ),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!("{skipped} stopwatch save failures were not reported")
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
}

fn start_ticker(session: &Session, config: &WidgetConfig) -> Option<JoinHandle<()>> {
    let period = config.tick_interval?;
    Some(spawn_ticker(
        session.engine.watch(),
        session.clock.clone(),
        period,
        |elapsed_ms| trace!("stopwatch {}", format_stopwatch(elapsed_ms)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use focus_widget::persist::PersistOp;

    #[test]
    fn report_failures_drains_past_overflow() {
        let (tx, mut rx) = broadcast::channel(2);
        for n in 0..5 {
            tx.send(PersistFailure {
                op: PersistOp::Save,
                message: format!("failure {n}"),
            })
            .unwrap();
        }
        report_failures(&mut rx);
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }
}
