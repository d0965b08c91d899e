//! Logic thread running a gameplay session.
//!
//! The session runs at a fixed tick rate, fed by key events from the bus and
//! publishing snapshots back on it.

pub mod clock;
pub mod dispatcher;
pub mod judgment;
pub mod session;

use crate::logic::clock::PlaybackPosition;
use crate::logic::session::Session;
use crate::system::bus::{SystemBus, SystemEvent};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Target ticks per second for the logic thread.
const TPS: u64 = 200;

/// Spawns the logic thread that drives `session`.
///
/// The thread runs a fixed-timestep loop that:
/// 1. Queues key events from the input side
/// 2. Handles system events (start, quit)
/// 3. Ticks the session at a fixed rate
/// 4. Sends snapshots, then the final result once every object is resolved
pub fn start_thread<P>(bus: SystemBus, mut session: Session<P>) -> io::Result<JoinHandle<()>>
where
    P: PlaybackPosition + Send + 'static,
{
    thread::Builder::new()
        .name("Logic Thread".to_string())
        .spawn(move || {
            log::info!("LOGIC: Thread started");

            let mut accumulator = Duration::new(0, 0);
            let mut last_time = Instant::now();
            let target_dt = Duration::from_secs_f64(1.0 / TPS as f64);

            loop {
                // 1. Queue input
                while let Ok(event) = bus.key_rx.try_recv() {
                    session.queue_input(event);
                }

                // 2. Handle system events
                while let Ok(sys_evt) = bus.sys_rx.try_recv() {
                    match sys_evt {
                        SystemEvent::Start => session.start(),
                        SystemEvent::Quit => {
                            log::info!("LOGIC: Quit received...");
                            publish_result(&bus, &session);
                            return;
                        }
                    }
                }

                // 3. Fixed-timestep update loop
                let current_time = Instant::now();
                let delta = current_time - last_time;
                last_time = current_time;
                accumulator += delta;

                let mut updated = false;
                let mut loops = 0;
                while accumulator >= target_dt && loops < 10 {
                    session.tick_with(target_dt.as_secs_f64());
                    accumulator -= target_dt;
                    loops += 1;
                    updated = true;
                }

                // 4. Send snapshot only if we updated
                if updated {
                    let _ = bus.snapshot_tx.try_send(session.snapshot());
                }

                if session.is_finished() {
                    log::info!("LOGIC: All objects resolved");
                    publish_result(&bus, &session);
                    return;
                }

                if loops == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
        })
}

fn publish_result<P: PlaybackPosition>(bus: &SystemBus, session: &Session<P>) {
    let result = session.result();
    log::info!(
        "LOGIC: Final score {} ({}), accuracy {:.2}%",
        result.score,
        result.grade,
        result.accuracy * 100.0
    );
    if let Err(e) = bus.result_tx.send(result) {
        log::error!("LOGIC: Failed to send result (receiver gone?): {}", e);
    }
}
