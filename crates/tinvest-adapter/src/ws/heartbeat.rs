/*
[INPUT]:  Ping interval, pong timeout, inbound activity notifications
[OUTPUT]: Ping-due / deadline-expired ticks for the connection loop
[POS]:    WebSocket layer - liveness probing of the open socket
[UPDATE]: When changing keepalive timing or liveness rules
*/

use std::time::Duration;

use tokio::time::{Instant, sleep_until};

/// What the connection loop must do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTick {
    /// Send a ping now, then call [`Heartbeat::ping_sent`]
    SendPing,
    /// No traffic since the last ping within the deadline
    Expired,
}

/// Ping timer and pending-pong deadline for one connection
#[derive(Debug)]
pub struct Heartbeat {
    ping_interval: Duration,
    pong_timeout: Duration,
    next_ping: Instant,
    pong_deadline: Option<Instant>,
}

impl Heartbeat {
    pub fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
            next_ping: Instant::now() + ping_interval,
            pong_deadline: None,
        }
    }

    /// Any inbound frame proves liveness: disarm the deadline, reschedule the ping
    pub fn record_activity(&mut self) {
        self.pong_deadline = None;
        self.next_ping = Instant::now() + self.ping_interval;
    }

    /// Arm the deadline on the first unanswered ping; later pings keep it
    pub fn ping_sent(&mut self) {
        let now = Instant::now();
        self.pong_deadline.get_or_insert(now + self.pong_timeout);
        self.next_ping = now + self.ping_interval;
    }

    pub fn is_waiting_for_pong(&self) -> bool {
        self.pong_deadline.is_some()
    }

    /// Resolve when the next heartbeat action is due. Cancel-safe.
    pub async fn tick(&self) -> HeartbeatTick {
        match self.pong_deadline {
            Some(deadline) if deadline <= self.next_ping => {
                sleep_until(deadline).await;
                HeartbeatTick::Expired
            }
            Some(deadline) => {
                // pings continue until the first deadline
                tokio::select! {
                    _ = sleep_until(deadline) => HeartbeatTick::Expired,
                    _ = sleep_until(self.next_ping) => HeartbeatTick::SendPing,
                }
            }
            None => {
                sleep_until(self.next_ping).await;
                HeartbeatTick::SendPing
            }
        }
    }
}
