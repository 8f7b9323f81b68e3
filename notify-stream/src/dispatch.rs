//! The thread between a [`Notifier`] and the consumer's queues.

use crate::{Error, Event, Notifier};
use crossbeam_channel::{select, Receiver, Sender, TryRecvError};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const THREAD_NAME: &str = "notify-stream dispatch loop";

// The DispatchLoop runs on its own thread and, on every turn, does exactly one of:
//
// -  stop, once the facade dropped (or signalled) the done channel;
//
// -  hand the buffered events to the consumer, one at a time, when the "more" signal is raised;
//
// -  read the next batch from the notifier into the buffer.
pub(crate) struct DispatchLoop {
    notifier: Arc<dyn Notifier>,
    pending: VecDeque<Event>,
    max_events: usize,
    error_backoff: Duration,
    events_tx: Sender<Event>,
    errors_tx: Sender<Error>,
    done_rx: Receiver<()>,
    more_tx: Sender<()>,
    more_rx: Receiver<()>,
}

/// The consumer's ends of the queues a [`DispatchLoop`] feeds.
pub(crate) struct Queues {
    pub events: Receiver<Event>,
    pub errors: Receiver<Error>,
    pub done: Sender<()>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Stop,
}

impl DispatchLoop {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        max_events: usize,
        error_backoff: Duration,
    ) -> (Self, Queues) {
        let (events_tx, events) = crossbeam_channel::bounded(0);
        let (errors_tx, errors) = crossbeam_channel::unbounded();
        let (done, done_rx) = crossbeam_channel::bounded(1);
        let (more_tx, more_rx) = crossbeam_channel::bounded(1);

        let dispatch = DispatchLoop {
            notifier,
            pending: VecDeque::new(),
            max_events,
            error_backoff,
            events_tx,
            errors_tx,
            done_rx,
            more_tx,
            more_rx,
        };
        let queues = Queues {
            events,
            errors,
            done,
        };
        (dispatch, queues)
    }

    // Run the dispatch loop.
    pub fn run(self) -> io::Result<()> {
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(|| self.dispatch_loop_thread())
            .map(drop)
    }

    fn dispatch_loop_thread(mut self) {
        while self.step() == Step::Continue {}
        log::debug!(
            "dispatch loop stopped with {} undelivered events",
            self.pending.len()
        );
        // dropping self closes the events queue
    }

    fn step(&mut self) -> Step {
        if self.shutdown_requested() {
            return Step::Stop;
        }
        if self.more_rx.try_recv().is_ok() {
            return self.drain();
        }
        self.read()
    }

    fn shutdown_requested(&self) -> bool {
        !matches!(self.done_rx.try_recv(), Err(TryRecvError::Empty))
    }

    fn raise_more(&self) {
        // a full slot already means "more", drop the duplicate
        let _ = self.more_tx.try_send(());
    }

    // Hands every buffered event to the consumer, waiting for each to be received.
    fn drain(&mut self) -> Step {
        while let Some(event) = self.pending.pop_front() {
            select! {
                send(self.events_tx, event) -> res => {
                    if res.is_err() {
                        return Step::Stop;
                    }
                }
                recv(self.done_rx) -> _ => return Step::Stop,
            }
        }
        Step::Continue
    }

    fn read(&mut self) -> Step {
        if self.pending.len() > self.max_events {
            log::debug!(
                "{} events waiting for the consumer, pausing reads",
                self.pending.len()
            );
            self.raise_more();
            return Step::Continue;
        }

        match self.notifier.read() {
            Ok(events) => {
                self.pending.extend(events);
                if !self.pending.is_empty() {
                    self.raise_more();
                }
                Step::Continue
            }
            // a failing read after close is the close itself
            Err(_) if self.shutdown_requested() => Step::Stop,
            Err(err) => {
                let _ = self.errors_tx.send(err);
                self.back_off()
            }
        }
    }

    // A failing read tends to fail again right away, wait before retrying.
    fn back_off(&self) -> Step {
        select! {
            recv(self.done_rx) -> _ => Step::Stop,
            default(self.error_backoff) => Step::Continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{DispatchLoop, Queues, Step};
    use crate::test::*;
    use crate::{Error, ErrorKind, Event, Notifier, Op};

    fn dispatch(notifier: &ScriptedNotifier, max_events: usize) -> (DispatchLoop, Queues) {
        DispatchLoop::new(
            std::sync::Arc::new(notifier.clone()),
            max_events,
            Duration::from_millis(1),
        )
    }

    fn events(names: &[&str]) -> Vec<Event> {
        names
            .iter()
            .map(|name| Event::new(Path::new("/watched").join(name), Op::CREATE))
            .collect()
    }

    #[test]
    fn more_signal_is_coalesced() {
        let notifier = ScriptedNotifier::default();
        notifier.push_events(events(&["a"]));
        notifier.push_events(events(&["b"]));
        let (mut dispatch, _queues) = dispatch(&notifier, 16);

        assert_eq!(dispatch.read(), Step::Continue);
        assert_eq!(dispatch.read(), Step::Continue);
        dispatch.raise_more();

        assert_eq!(dispatch.more_rx.len(), 1);
        assert_eq!(dispatch.pending.len(), 2);
    }

    #[test]
    fn empty_read_does_not_raise_more() {
        let notifier = ScriptedNotifier::default();
        let (mut dispatch, _queues) = dispatch(&notifier, 16);

        assert_eq!(dispatch.read(), Step::Continue);

        assert_eq!(notifier.reads(), 1);
        assert!(dispatch.more_rx.is_empty());
    }

    #[test]
    fn full_buffer_skips_the_read() {
        let notifier = ScriptedNotifier::default();
        notifier.push_events(events(&["a", "b", "c"]));
        notifier.push_events(events(&["d"]));
        let (mut dispatch, _queues) = dispatch(&notifier, 2);

        dispatch.read();
        assert_eq!(notifier.reads(), 1);

        dispatch.read();
        assert_eq!(notifier.reads(), 1, "read past max_events");
        assert_eq!(dispatch.pending.len(), 3);
        assert_eq!(dispatch.more_rx.len(), 1);
    }

    #[test]
    fn drain_wins_over_read() {
        let notifier = ScriptedNotifier::default();
        notifier.push_events(events(&["a", "b"]));
        let (mut dispatch, queues) = dispatch(&notifier, 16);
        dispatch.read();

        let consumer = std::thread::spawn(move || {
            let received: Vec<_> = queues.events.iter().take(2).collect();
            (received, queues)
        });
        assert_eq!(dispatch.step(), Step::Continue);
        let (received, _queues) = consumer.join().unwrap();

        assert_eq!(received, events(&["a", "b"]));
        assert_eq!(notifier.reads(), 1);
        assert!(dispatch.pending.is_empty());
    }

    #[test]
    fn shutdown_interrupts_a_stalled_drain() {
        let notifier = ScriptedNotifier::default();
        notifier.push_events(events(&["a", "b"]));
        let (mut dispatch, queues) = dispatch(&notifier, 16);
        dispatch.read();
        dispatch.more_rx.try_recv().unwrap();

        drop(queues.done);
        assert_eq!(dispatch.drain(), Step::Stop);
    }

    #[test]
    fn read_errors_are_published() {
        let notifier = ScriptedNotifier::default();
        notifier.push_error(Error::new(ErrorKind::EventOverflow));
        let (mut dispatch, queues) = dispatch(&notifier, 16);

        assert_eq!(dispatch.read(), Step::Continue);

        let err = queues.errors.try_recv().expect("published error");
        assert!(err.is_overflow());
    }

    #[test]
    fn repeated_read_errors_are_paced() {
        let notifier = ScriptedNotifier::default();
        for _ in 0..3 {
            notifier.push_error(Error::io(std::io::ErrorKind::Other.into()));
        }
        let (dispatch, queues) = DispatchLoop::new(
            std::sync::Arc::new(notifier.clone()),
            16,
            Duration::from_millis(200),
        );
        dispatch.run().expect("spawn");

        recv_timeout(&queues.errors);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(notifier.reads(), 1);
        assert!(queues.errors.try_recv().is_err());

        recv_timeout(&queues.errors);
        assert_eq!(notifier.reads(), 2);
    }

    #[test]
    fn shutdown_interrupts_the_pause_after_an_error() {
        let notifier = ScriptedNotifier::default();
        notifier.push_error(Error::io(std::io::ErrorKind::Other.into()));
        let (mut dispatch, queues) = DispatchLoop::new(
            std::sync::Arc::new(notifier.clone()),
            16,
            Duration::from_secs(30),
        );
        let Queues { errors, done, .. } = queues;
        let closer = std::thread::spawn(move || {
            recv_timeout(&errors);
            drop(done);
        });

        let started = std::time::Instant::now();
        assert_eq!(dispatch.read(), Step::Stop);
        assert!(started.elapsed() < Duration::from_secs(10));
        closer.join().unwrap();
    }

    #[test]
    fn read_errors_after_shutdown_are_swallowed() {
        let notifier = ScriptedNotifier::default();
        let (mut dispatch, queues) = dispatch(&notifier, 16);
        notifier.close().unwrap();
        drop(queues.done);

        assert_eq!(dispatch.read(), Step::Stop);
        assert!(queues.errors.try_recv().is_err());
    }

    #[test]
    fn consumer_that_never_receives_stops_reads() {
        let notifier = ScriptedNotifier::default();
        notifier.push_events(events(&["a"]));
        notifier.push_events(events(&["b"]));
        let (dispatch, queues) = dispatch(&notifier, 16);
        dispatch.run().expect("spawn");

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(notifier.reads(), 1);

        let first = recv_timeout(&queues.events);
        assert_eq!(first, events(&["a"])[0]);
        let second = recv_timeout(&queues.events);
        assert_eq!(second, events(&["b"])[0]);
        assert!(notifier.reads() >= 2);

        drop(queues.done);
        assert_disconnected(&queues.events);
    }

    #[test]
    fn shutdown_ends_the_events_queue() {
        let notifier = ScriptedNotifier::default();
        let (dispatch, queues) = dispatch(&notifier, 16);
        dispatch.run().expect("spawn");

        queues.done.send(()).unwrap();

        assert_disconnected(&queues.events);
    }
}
