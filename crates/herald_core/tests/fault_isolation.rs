//! Fault isolation tests
//!
//! A panicking subscriber must never stop delivery or escape `invoke`; the
//! fault is only observable through the tracing log.

use herald_core::{Allow, Cancellable, EventDispatcher, Notify};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// In-memory log sink
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLog {
    type Writer = CapturedLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with all tracing output captured
fn with_captured_log(f: impl FnOnce()) -> String {
    let log = CapturedLog::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(log.clone())
        .with_ansi(false)
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    log.contents()
}

#[test]
fn test_fault_is_logged_and_delivery_continues() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = EventDispatcher::<Notify<u64>>::new("Engine", "FrameTick", true).unwrap();

    let ok1 = Arc::clone(&calls);
    dispatcher.add_handler(move |_: &u64| ok1.lock().unwrap().push("ok1"));
    dispatcher.add_handler(|frame: &u64| panic!("tick {frame} exploded"));
    let ok2 = Arc::clone(&calls);
    dispatcher.add_handler(move |_: &u64| ok2.lock().unwrap().push("ok2"));

    let output = with_captured_log(|| dispatcher.invoke(&9));

    assert_eq!(*calls.lock().unwrap(), vec!["ok1", "ok2"]);
    assert!(output.contains("ERROR"), "missing error record: {output}");
    assert!(output.contains("subscriber to Engine.FrameTick panicked: tick 9 exploded"));
    assert!(output.contains("owner=Engine"));
    assert!(output.contains("event=FrameTick"));
}

#[test]
fn test_custom_error_message_template() {
    let dispatcher = EventDispatcher::<Notify<u64>>::builder("Assets", "TableRenamed")
        .error_message("[{owner}/{event}] handler crashed ({panic})")
        .build()
        .unwrap();
    dispatcher.add_handler(|_: &u64| panic!("bad table"));

    let output = with_captured_log(|| dispatcher.invoke(&0));

    assert!(output.contains("[Assets/TableRenamed] handler crashed (bad table)"));
}

#[test]
fn test_every_fault_is_reported() {
    let dispatcher = EventDispatcher::<Notify<u64>>::new("Engine", "FrameTick", true).unwrap();
    for _ in 0..3 {
        dispatcher.add_handler(|_: &u64| panic!("again"));
    }

    let output = with_captured_log(|| dispatcher.invoke(&0));

    assert_eq!(output.matches("panicked: again").count(), 3);
}

#[test]
fn test_cancellable_fault_keeps_default_verdict() {
    let dispatcher =
        EventDispatcher::<Cancellable<str>>::new("World", "RegionChange", true).unwrap();
    dispatcher.add_handler(|_: &str, _: &mut Allow| panic!("lookup failed"));
    dispatcher.add_handler(|_: &str, _: &mut Allow| {});

    let mut verdict = false;
    let output = with_captured_log(|| verdict = dispatcher.decide("meadow"));

    assert!(verdict);
    assert!(output.contains("subscriber to World.RegionChange panicked: lookup failed"));
}

#[test]
fn test_construction_failure_is_logged() {
    let output = with_captured_log(|| {
        assert!(EventDispatcher::<Notify<u64, String>>::new("Engine", "Query", true).is_err());
    });

    assert!(output.contains("multicast event declared with a return value"));
}
