//! Frame-loop simulation
//!
//! Drives a hub the way a multithreaded host does: the main thread raises a
//! per-frame tick and periodic region changes while loader threads keep
//! subscribing and unsubscribing in the background.

use anyhow::Result;
use herald_core::{Allow, Cancellable, EventHub, Notify};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Payload of `Engine.FrameTick`
#[derive(Clone, Debug)]
pub struct FrameTick {
    pub frame: u64,
    pub delta: Duration,
}

/// Payload of `World.RegionChange`
#[derive(Clone, Debug)]
pub struct RegionChange {
    pub from: String,
    pub to: String,
}

pub type TickEvent = Notify<FrameTick>;
pub type RegionEvent = Cancellable<RegionChange>;

/// How often a region change is raised
const REGION_CHANGE_EVERY: u64 = 10;

const REGIONS: [&str; 2] = ["meadow", "harbor"];

#[derive(Clone, Debug)]
pub struct SimulateOptions {
    pub frames: u64,
    pub loaders: usize,
    pub frame_interval: Duration,
    /// Frame on which a built-in subscriber panics
    pub panic_frame: Option<u64>,
    /// Region name the built-in guard vetoes
    pub restricted_region: String,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            frames: 120,
            loaders: 4,
            frame_interval: Duration::from_millis(2),
            panic_frame: None,
            restricted_region: "restricted".to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SimulationReport {
    pub frames: u64,
    pub tick_deliveries: u64,
    pub loader_deliveries: u64,
    pub loader_subscriptions: u64,
    pub region_changes_allowed: u64,
    pub region_changes_vetoed: u64,
    pub tick_subscribers_at_end: usize,
}

/// Run the simulation against `hub`
pub fn run(hub: &EventHub, options: &SimulateOptions) -> Result<SimulationReport> {
    let ticks = hub.register::<TickEvent>("Engine", "FrameTick")?;
    let regions = hub.register::<RegionEvent>("World", "RegionChange")?;

    let tick_deliveries = Arc::new(AtomicU64::new(0));
    let loader_deliveries = Arc::new(AtomicU64::new(0));
    let loader_subscriptions = Arc::new(AtomicU64::new(0));
    let stop = AtomicBool::new(false);

    let counted = Arc::clone(&tick_deliveries);
    let _counter = ticks.subscribe(move |_: &FrameTick| {
        counted.fetch_add(1, Ordering::Relaxed);
    });

    let _flaky = options.panic_frame.map(|at| {
        ticks.subscribe(move |tick: &FrameTick| {
            if tick.frame == at {
                panic!("injected fault at frame {at}");
            }
        })
    });

    let restricted = options.restricted_region.clone();
    let _guard = regions.subscribe(move |change: &RegionChange, allow: &mut Allow| {
        allow.set(change.to != restricted);
    });

    let mut report = SimulationReport {
        frames: options.frames,
        ..Default::default()
    };

    thread::scope(|scope| {
        for loader in 0..options.loaders {
            let ticks = &ticks;
            let stop = &stop;
            let delivered = Arc::clone(&loader_deliveries);
            let subscriptions = Arc::clone(&loader_subscriptions);
            let interval = options.frame_interval;

            scope.spawn(move || {
                while !stop.load(Ordering::Acquire) {
                    let delivered = Arc::clone(&delivered);
                    let subscription = ticks.subscribe(move |_: &FrameTick| {
                        delivered.fetch_add(1, Ordering::Relaxed);
                    });
                    subscriptions.fetch_add(1, Ordering::Relaxed);
                    thread::sleep(interval * 2);
                    drop(subscription);
                    thread::sleep(interval);
                }
                tracing::debug!(loader, "loader stopped");
            });
        }

        let mut region = REGIONS[0].to_string();
        for frame in 1..=options.frames {
            ticks.invoke(&FrameTick {
                frame,
                delta: options.frame_interval,
            });

            if frame % REGION_CHANGE_EVERY == 0 {
                let to = match (frame / REGION_CHANGE_EVERY) % 3 {
                    0 => options.restricted_region.clone(),
                    n => REGIONS[n as usize % REGIONS.len()].to_string(),
                };
                let change = RegionChange {
                    from: region.clone(),
                    to,
                };

                if regions.decide(&change) {
                    tracing::debug!(
                        frame,
                        from = %change.from,
                        to = %change.to,
                        "region change allowed"
                    );
                    report.region_changes_allowed += 1;
                    region = change.to;
                } else {
                    tracing::debug!(
                        frame,
                        from = %change.from,
                        to = %change.to,
                        "region change vetoed"
                    );
                    report.region_changes_vetoed += 1;
                }
            }

            thread::sleep(options.frame_interval);
        }

        stop.store(true, Ordering::Release);
    });

    report.tick_deliveries = tick_deliveries.load(Ordering::Relaxed);
    report.loader_deliveries = loader_deliveries.load(Ordering::Relaxed);
    report.loader_subscriptions = loader_subscriptions.load(Ordering::Relaxed);
    report.tick_subscribers_at_end = ticks.len();

    tracing::info!(
        frames = report.frames,
        tick_deliveries = report.tick_deliveries,
        loader_deliveries = report.loader_deliveries,
        vetoed = report.region_changes_vetoed,
        "simulation finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(frames: u64) -> SimulateOptions {
        SimulateOptions {
            frames,
            loaders: 2,
            frame_interval: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_frame_reaches_counter() {
        let hub = EventHub::new();
        let report = run(&hub, &quick(30)).unwrap();

        assert_eq!(report.tick_deliveries, 30);
        assert_eq!(report.tick_subscribers_at_end, 1);
        assert!(report.loader_subscriptions > 0);
    }

    #[test]
    fn test_injected_fault_is_isolated() {
        let hub = EventHub::new();
        let options = SimulateOptions {
            panic_frame: Some(5),
            ..quick(12)
        };

        let report = run(&hub, &options).unwrap();
        assert_eq!(report.tick_deliveries, 12);
    }

    #[test]
    fn test_restricted_region_is_vetoed() {
        let hub = EventHub::new();
        let report = run(&hub, &quick(60)).unwrap();

        // Changes at frames 10..=60; every third targets the restricted region
        assert_eq!(report.region_changes_vetoed, 2);
        assert_eq!(report.region_changes_allowed, 4);
    }

    #[test]
    fn test_guards_are_released() {
        let hub = EventHub::new();
        run(&hub, &quick(5)).unwrap();

        let ticks = hub.get::<TickEvent>("Engine", "FrameTick").unwrap();
        let regions = hub.get::<RegionEvent>("World", "RegionChange").unwrap();
        assert!(ticks.is_empty());
        assert!(regions.is_empty());
    }
}
