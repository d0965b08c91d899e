//! Demo entry point: plays a generated chart with an autoplay "player".
//!
//! The main thread stands in for both the audio device (advancing the shared
//! sample counter) and the player (sending key events with timing jitter).
//! The logic thread judges them and reports the result as JSON.

mod input;
mod logic;
mod models;
mod shared;
mod system;

use crate::input::events::KeyEvent;
use crate::logic::clock::format_timestamp;
use crate::logic::session::Session;
use crate::models::engine::{Chart, ChartTiming, KeySymbol, RawNote};
use crate::models::settings::GameplaySettings;
use crate::system::bus::{SystemBus, SystemEvent};
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

const SEED: u64 = 0x5EED;
const KEYS: u32 = 6;

/// Maximum autoplay timing error in seconds.
const JITTER: f64 = 0.09;

fn main() {
    unsafe {
        std::env::set_var("RUST_LOG", "info");
    }
    env_logger::init();

    log::info!("MAIN: Booting rhythm-judge demo...");

    if let Err(e) = run() {
        log::error!("MAIN: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("settings.toml"));
    let settings = GameplaySettings::load_or_default(&settings_path);

    let chart = demo_chart(&settings).map_err(|e| e.to_string())?;
    let script = autoplay_script(&chart, JITTER, &mut rand::rng());

    let bus = SystemBus::new();
    let session =
        Session::new(&chart, settings, bus.playback_position()).map_err(|e| e.to_string())?;
    let handle = logic::start_thread(bus.clone(), session).map_err(|e| e.to_string())?;

    let rate = bus.audio_sample_rate.load(Ordering::Relaxed) as f64;
    let channels = bus.audio_channels.load(Ordering::Relaxed) as f64;

    bus.sys_tx.send(SystemEvent::Start).map_err(|e| e.to_string())?;
    let started = Instant::now();
    let mut next_event = 0;
    let mut last_report = 0.0;

    let result = loop {
        let t = started.elapsed().as_secs_f64();
        bus.audio_position
            .store((t * rate * channels) as u64, Ordering::Release);

        while let Some(event) = script.get(next_event).filter(|e| e.time <= t) {
            if bus.key_tx.send(*event).is_err() {
                break;
            }
            next_event += 1;
        }

        while let Ok(snapshot) = bus.snapshot_rx.try_recv() {
            if snapshot.time - last_report >= 1.0 {
                last_report = snapshot.time;
                log::info!(
                    "MAIN: {} score {} combo {} acc {:.2}% ({} live, {} left, {:.0} tps)",
                    snapshot.time_label,
                    snapshot.score,
                    snapshot.combo,
                    snapshot.accuracy * 100.0,
                    snapshot.live_notes.len(),
                    snapshot.remaining_notes,
                    snapshot.fps
                );
            }
        }

        if let Ok(result) = bus.result_rx.try_recv() {
            break result;
        }
        thread::sleep(Duration::from_millis(1));
    };

    if handle.join().is_err() {
        return Err("logic thread panicked".to_string());
    }

    log::info!(
        "MAIN: Finished after {}",
        format_timestamp(started.elapsed().as_secs_f64())
    );
    let json = serde_json::to_string_pretty(&result).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

/// Sixteen bars of quarter notes with a few holds on top.
fn demo_chart(settings: &GameplaySettings) -> Result<Chart, models::engine::ChartError> {
    let timing = ChartTiming::new(120.0, 9.0, 5.0)?;
    let beat = 60.0 / timing.bpm;

    let timestamps: Vec<f64> = (0..64).map(|i| 2.0 + i as f64 * beat).collect();
    let pool: Vec<KeySymbol> = (0..KEYS).map(KeySymbol).collect();
    let generated = Chart::with_generated_symbols(
        timing,
        &timestamps,
        &pool,
        SEED,
        settings.symbol_reuse_gap(&timing),
    )?;

    let hold_key = KeySymbol(KEYS);
    let mut notes = generated.notes;
    for bar in [2.0, 6.0, 10.0] {
        let entry = 2.0 + bar * 4.0 * beat;
        notes.push(RawNote::hold(entry, entry + 2.0 * beat, hold_key));
    }

    Chart::new(timing, notes)
}

/// Key events a player off by up to `jitter` seconds would produce for
/// `chart`, in time order.
fn autoplay_script(chart: &Chart, jitter: f64, rng: &mut impl Rng) -> Vec<KeyEvent> {
    let mut offset = || {
        if jitter > 0.0 {
            rng.random_range(-jitter..jitter)
        } else {
            0.0
        }
    };
    let mut events = Vec::new();

    for note in &chart.notes {
        let symbols = note.symbols();
        let times = note.timestamps();
        let down = times[0] + offset();
        events.push(KeyEvent::down(symbols[0], down));

        // Holds release on their second timestamp; taps shortly after the press.
        let up = match times.get(1) {
            Some(release) => release + offset(),
            None => down + 0.05,
        };
        events.push(KeyEvent::up(symbols[symbols.len() - 1], up));
    }

    events.sort_by(|a, b| a.time.total_cmp(&b.time));
    events
}
