//! Captures `tracing` events emitted while a closure runs.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct CapturedEvent {
    pub(crate) level: Level,
    pub(crate) message: String,
}

struct Capture(Arc<Mutex<Vec<CapturedEvent>>>);

#[derive(Default)]
struct MessageVisitor(String);

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

impl<S: Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        self.0.lock().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.0,
        });
    }
}

/// Run `f` with a thread-local subscriber and return its result together with
/// every event it logged.
pub(crate) fn capture<F, R>(f: F) -> (R, Vec<CapturedEvent>)
where
    F: FnOnce() -> R,
{
    let events = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(Capture(events.clone()));
    let result = tracing::subscriber::with_default(subscriber, f);
    let events = events.lock().clone();
    (result, events)
}

/// Events at `level` whose message contains `needle`.
pub(crate) fn matching<'a>(
    events: &'a [CapturedEvent],
    level: Level,
    needle: &'a str,
) -> impl Iterator<Item = &'a CapturedEvent> + 'a {
    events
        .iter()
        .filter(move |event| event.level == level && event.message.contains(needle))
}
