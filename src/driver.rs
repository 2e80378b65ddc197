//! Async reveal driver.
//!
//! Walks a transmission's reveal plan on the tokio clock and hands each
//! character to the display. Every tick re-checks the request token, so a
//! driver left over from a superseded transmission goes quiet instead of
//! writing into the new one.

use log::warn;
use tokio::time::{sleep_until, Instant};

use crate::reveal::RevealTick;
use crate::transmitter::{Transmission, Transmitter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Every character was shown and the transmission marked complete.
    Completed { revealed: usize },
    /// A newer transmission took over; the remaining ticks were dropped.
    Superseded { revealed: usize },
}

/// Emit `transmission`'s characters at their scheduled times, then finish it
/// once the audio and settle period have run out.
pub async fn run_reveal<F>(transmitter: &Transmitter, transmission: &Transmission, mut on_char: F) -> RevealOutcome
where
    F: FnMut(RevealTick),
{
    let origin = Instant::now();
    let token = transmission.token;
    let mut revealed = 0;

    for tick in transmission.reveal().ticks() {
        sleep_until(origin + tick.delay()).await;
        if !transmitter.is_current(token) {
            warn!("dropping stale reveal ticks for {token}");
            return RevealOutcome::Superseded { revealed };
        }
        on_char(tick);
        revealed += 1;
    }

    sleep_until(origin + transmission.hold).await;
    if transmitter.complete(token) || transmitter.is_current(token) {
        RevealOutcome::Completed { revealed }
    } else {
        RevealOutcome::Superseded { revealed }
    }
}
