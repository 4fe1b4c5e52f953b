//! Pull-based consumption of an observable.
//!
//! [`PullIter`] turns the push protocol around: the consumer asks for the next
//! value and awaits it. Values that arrive while nobody is asking are queued;
//! pulls issued before a value arrives wait in the order they were issued.

use std::{
    cell::RefCell,
    collections::VecDeque,
    future::Future,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::sync::oneshot;

use super::Observable;
use crate::{
    errors::RxError,
    subscription::subscribe::{Subscribeable, Subscriber, Subscription},
};

/// Outcome of a successful pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullResult<T> {
    /// The next value of the stream.
    Value(T),
    /// The stream is finished. Carries the value passed to
    /// [`PullIter::cancel`] when consumption was ended that way.
    Done(Option<T>),
}

type Resolution<T> = Result<PullResult<T>, RxError>;

enum Terminal {
    Complete,
    Error(RxError),
}

impl Terminal {
    fn resolution<T>(&self) -> Resolution<T> {
        match self {
            Terminal::Complete => Ok(PullResult::Done(None)),
            Terminal::Error(e) => Err(e.clone()),
        }
    }
}

struct PullState<T> {
    queue: VecDeque<T>,
    waiting: VecDeque<oneshot::Sender<Resolution<T>>>,
    terminal: Option<Terminal>,
}

impl<T> Default for PullState<T> {
    fn default() -> Self {
        PullState {
            queue: VecDeque::new(),
            waiting: VecDeque::new(),
            terminal: None,
        }
    }
}

impl<T> PullState<T> {
    fn push(state: &RefCell<Self>, mut value: T) {
        let mut st = state.borrow_mut();
        while let Some(waiter) = st.waiting.pop_front() {
            match waiter.send(Ok(PullResult::Value(value))) {
                Ok(()) => return,
                // The pull was dropped before resolving; try the next one.
                Err(Ok(PullResult::Value(v))) => value = v,
                Err(_) => return,
            }
        }
        st.queue.push_back(value);
    }

    fn terminate(state: &RefCell<Self>, terminal: Terminal) {
        let mut st = state.borrow_mut();
        if st.terminal.is_some() {
            return;
        }
        for waiter in st.waiting.drain(..) {
            let _ = waiter.send(terminal.resolution());
        }
        st.terminal = Some(terminal);
    }
}

/// Future returned by [`PullIter::pull_next`].
pub struct Pull<T> {
    inner: PullInner<T>,
}

enum PullInner<T> {
    Ready(Option<Resolution<T>>),
    Waiting(oneshot::Receiver<Resolution<T>>),
}

// No field is structurally pinned.
impl<T> Unpin for Pull<T> {}

impl<T> Future for Pull<T> {
    type Output = Resolution<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            PullInner::Ready(resolution) => {
                Poll::Ready(resolution.take().unwrap_or(Ok(PullResult::Done(None))))
            }
            PullInner::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(resolution)) => Poll::Ready(resolution),
                // The iterator went away while this pull was waiting.
                Poll::Ready(Err(_)) => Poll::Ready(Ok(PullResult::Done(None))),
                Poll::Pending => Poll::Pending,
            },
        }
    }
}

/// Pull-based view of an [`Observable`], created by
/// [`Observable::into_pull`].
///
/// The observable is subscribed lazily, on the first pull. Completion resolves
/// every pending and later pull with `Done(None)`; an error rejects them with
/// that error. Values queued before the stream terminated are still handed out
/// first.
///
/// `PullIter` also implements [`Stream`], yielding `Ok(value)` for values, a
/// single `Err(e)` for an error, and ending afterwards.
///
/// Dropping the iterator unsubscribes from the observable.
pub struct PullIter<T> {
    source: RefCell<Option<Observable<T>>>,
    state: Rc<RefCell<PullState<T>>>,
    subscription: RefCell<Option<Subscription>>,
    in_flight: Option<Pull<T>>,
    exhausted: bool,
}

impl<T: 'static> PullIter<T> {
    pub(crate) fn new(source: Observable<T>) -> Self {
        PullIter {
            source: RefCell::new(Some(source)),
            state: Rc::default(),
            subscription: RefCell::new(None),
            in_flight: None,
            exhausted: false,
        }
    }

    /// Requests the next value.
    ///
    /// Pulls resolve in the order they were issued.
    pub fn pull_next(&self) -> Pull<T> {
        let ready = {
            let mut st = self.state.borrow_mut();
            match st.queue.pop_front() {
                Some(v) => Some(Ok(PullResult::Value(v))),
                None => st.terminal.as_ref().map(Terminal::resolution),
            }
        };
        if let Some(resolution) = ready {
            return Pull {
                inner: PullInner::Ready(Some(resolution)),
            };
        }

        let (tx, rx) = oneshot::channel();
        self.state.borrow_mut().waiting.push_back(tx);
        self.connect();
        Pull {
            inner: PullInner::Waiting(rx),
        }
    }

    /// Ends consumption early, returning `Done(Some(value))`.
    ///
    /// Pending pulls resolve with `Done(None)`, the subscription is released, and
    /// later pulls report `Done(None)`.
    pub fn cancel(&self, value: T) -> PullResult<T> {
        self.finish();
        PullResult::Done(Some(value))
    }

    /// Ends consumption early and hands `error` back to the caller.
    ///
    /// Behaves like [`cancel`](PullIter::cancel) for the stream itself.
    pub fn raise(&self, error: RxError) -> Result<PullResult<T>, RxError> {
        self.finish();
        Err(error)
    }

    fn connect(&self) {
        let source = self.source.borrow_mut().take();
        let Some(source) = source else {
            return;
        };

        let (st_next, st_error, st_complete) = (
            Rc::clone(&self.state),
            Rc::clone(&self.state),
            Rc::clone(&self.state),
        );
        let subscriber = Subscriber::new(
            move |v| PullState::push(&st_next, v),
            move |e| PullState::terminate(&st_error, Terminal::Error(e)),
            move || PullState::terminate(&st_complete, Terminal::Complete),
        );

        match source.subscribe(subscriber) {
            Ok(subscription) => *self.subscription.borrow_mut() = Some(subscription),
            Err(e) => PullState::terminate(&self.state, Terminal::Error(e)),
        }
    }

    fn finish(&self) {
        self.source.borrow_mut().take();
        let subscription = self.subscription.borrow_mut().take();
        if let Some(subscription) = subscription {
            subscription.release();
        }
        let dropped = std::mem::take(&mut self.state.borrow_mut().queue);
        drop(dropped);
        PullState::terminate(&self.state, Terminal::Complete);
    }
}

impl<T: 'static> Stream for PullIter<T> {
    type Item = Result<T, RxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(None);
        }

        let mut pull = match this.in_flight.take() {
            Some(pull) => pull,
            None => this.pull_next(),
        };
        match Pin::new(&mut pull).poll(cx) {
            Poll::Pending => {
                this.in_flight = Some(pull);
                Poll::Pending
            }
            Poll::Ready(Ok(PullResult::Value(v))) => Poll::Ready(Some(Ok(v))),
            Poll::Ready(Ok(PullResult::Done(_))) => {
                this.exhausted = true;
                Poll::Ready(None)
            }
            Poll::Ready(Err(e)) => {
                this.exhausted = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}

impl<T> Drop for PullIter<T> {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.release();
        }
    }
}
