//! The long-poll event pump.
//!
//! One poll is outstanding at a time. Events within a response are
//! dispatched in array order before the next poll is issued; the stream
//! token only advances on success. Transport failures and local timeouts
//! are absorbed with a fixed backoff and never surface to observers.

use std::time::Duration;

use crate::client::MatrixClient;
use crate::room::Phase;

pub(crate) async fn run(client: MatrixClient, mut from: String) {
    let config = client.config();
    let local_timeout =
        Duration::from_millis(config.longpoll_timeout_ms + config.longpoll_grace_ms);
    let backoff = Duration::from_millis(config.retry_backoff_ms);

    client.emit_log("event stream started").await;
    loop {
        let poll = client.poll_events(&from);
        match tokio::time::timeout(local_timeout, poll).await {
            Ok(Ok(body)) => {
                for event in body.chunk {
                    client.dispatch_event(event, Phase::Forward).await;
                }
                from = body.end;
            }
            Ok(Err(err)) => {
                warn!(error = %err, "event poll failed, backing off");
                tokio::time::sleep(backoff).await;
            }
            Err(_) => {
                debug!("event poll exceeded the local timeout, backing off");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
