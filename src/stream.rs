//! The reactor-local emitter.
//!
//! This is the minimal primitive the higher-level event-stream combinator library (map / filter
//! / scan / union / concat / sync / mux) builds on; that library is an external collaborator and
//! out of scope here (§1). All this crate provides is the contract it needs: something a
//! connector can feed a dequeued value into, from the reactor's own thread, that fans it out to
//! whatever the reactor wired up in its constructor.

/// A single-threaded publish/subscribe point. Subscribers are plain closures; there is no
/// unsubscribe, since a reactor's wiring is fixed for its lifetime.
pub struct EventStream<T> {
    subscribers: Vec<Box<dyn FnMut(&T) + Send>>,
}

impl<T> EventStream<T> {
    pub fn new() -> Self {
        EventStream {
            subscribers: Vec::new(),
        }
    }

    /// Registers a handler invoked on every subsequent published value, in subscription order.
    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: FnMut(&T) + Send + 'static,
    {
        self.subscribers.push(Box::new(handler));
    }

    pub fn publish(&mut self, value: &T) {
        for subscriber in &mut self.subscribers {
            subscriber(value);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl<T> Default for EventStream<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn publish_reaches_every_subscriber_in_order() {
        let sink: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));
        let mut stream = EventStream::new();

        let sink_a = sink.clone();
        stream.subscribe(move |v: &i32| sink_a.lock().unwrap().push(*v));
        let sink_b = sink.clone();
        stream.subscribe(move |v: &i32| sink_b.lock().unwrap().push(*v * 10));

        stream.publish(&1);
        stream.publish(&2);

        assert_eq!(*sink.lock().unwrap(), vec![1, 10, 2, 20]);
    }
}
