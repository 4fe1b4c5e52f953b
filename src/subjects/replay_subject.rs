use std::{cell::RefCell, collections::VecDeque, rc::Rc, time::Duration};

use super::{Registry, SubjectState};
use crate::{
    errors::{ObservableError, RxError, UnsubscriptionError},
    observer::Observer,
    scheduler::{self, Scheduler},
    subscription::subscribe::{Subscribeable, Subscriber, Subscription, Unsubscribeable},
    Observable, ObservableExt,
};

/// Specifies the buffer size for replaying previous emissions in `ReplaySubject`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufSize {
    /// Specifies an infinite buffer size, allowing all emitted values to be replayed.
    Unbounded,

    /// Specifies a limited buffer size with the maximum number of values to be replayed.
    Bounded(usize),
}

struct Window {
    size: Duration,
    scheduler: Rc<dyn Scheduler>,
}

/// Replaying old values to new subscribers, this variant of `Subject` emits these
/// values upon subscription.
///
/// `ReplaySubject` keeps a buffer of emitted values and sends the buffered values
/// to every new subscriber before any live value. The buffer can be limited in
/// size, in age, or both; the oldest values are dropped first.
///
/// Even after an error or completion, `ReplaySubject` replays the buffer to new
/// subscribers and then hands them the terminal notification.
///
/// # Examples
///
///```no_run
/// use rxpush::{
///     subjects::{BufSize, ReplaySubject},
///     subscribe::Subscriber,
/// };
/// use rxpush::{Observer, Subscribeable};
///
/// let (mut emitter, receiver) = ReplaySubject::emitter_receiver(BufSize::Bounded(2));
///
/// emitter.next(1);
/// emitter.next(2);
/// emitter.next(3);
/// emitter.complete();
///
/// // Receives 2 and 3, then completes.
/// let _ = receiver.subscribe(Subscriber::new(
///     |v| println!("replayed {}", v),
///     |e| eprintln!("error {}", e),
///     || println!("completed"),
/// ));
///```
pub struct ReplaySubject<T> {
    buf_size: BufSize,
    window: Option<Window>,
    values: VecDeque<(T, Duration)>,
    registry: Registry<T>,
}

impl<T: 'static> SubjectState for ReplaySubject<T> {
    type Item = T;

    fn registry(&mut self) -> &mut Registry<T> {
        &mut self.registry
    }
}

impl<T: Clone + 'static> ReplaySubject<T> {
    /// Creates a `ReplaySubject` with a specified buffer size.
    ///
    /// A buffer size of `BufSize::Unbounded` retains every past value.
    pub fn emitter_receiver(
        buf_size: BufSize,
    ) -> (ReplaySubjectEmitter<T>, ReplaySubjectReceiver<T>) {
        Self::build(buf_size, None)
    }

    /// Creates a `ReplaySubject` whose buffered values also expire after
    /// `window_size_ms` milliseconds, measured on the default scheduler.
    ///
    /// A value is dropped once its age reaches the window, so only values
    /// younger than `window_size_ms` are replayed.
    pub fn emitter_receiver_time_aware(
        buf_size: BufSize,
        window_size_ms: u64,
    ) -> (ReplaySubjectEmitter<T>, ReplaySubjectReceiver<T>) {
        Self::emitter_receiver_with_scheduler(
            buf_size,
            Some(window_size_ms),
            scheduler::default_scheduler(),
        )
    }

    /// Creates a `ReplaySubject` taking timestamps from `scheduler`.
    ///
    /// Without a window the scheduler is not consulted.
    pub fn emitter_receiver_with_scheduler(
        buf_size: BufSize,
        window_size_ms: Option<u64>,
        scheduler: Rc<dyn Scheduler>,
    ) -> (ReplaySubjectEmitter<T>, ReplaySubjectReceiver<T>) {
        Self::build(
            buf_size,
            window_size_ms.map(|ms| Window {
                size: Duration::from_millis(ms),
                scheduler,
            }),
        )
    }

    fn build(
        buf_size: BufSize,
        window: Option<Window>,
    ) -> (ReplaySubjectEmitter<T>, ReplaySubjectReceiver<T>) {
        let values = match buf_size {
            BufSize::Unbounded => VecDeque::with_capacity(16),
            BufSize::Bounded(size) => VecDeque::with_capacity(size),
        };
        let s = Rc::new(RefCell::new(ReplaySubject {
            buf_size,
            window,
            values,
            registry: Registry::new(),
        }));

        (ReplaySubjectEmitter(Rc::clone(&s)), ReplaySubjectReceiver(s))
    }

    fn now(&self) -> Duration {
        self.window
            .as_ref()
            .map_or(Duration::ZERO, |w| w.scheduler.now())
    }

    // Drops values over the size limit, then values whose age reached the window.
    fn trim(&mut self) {
        if let BufSize::Bounded(size) = self.buf_size {
            while self.values.len() > size {
                self.values.pop_front();
            }
        }
        if let Some(window) = &self.window {
            let now = window.scheduler.now();
            while let Some((_, at)) = self.values.front() {
                if now.saturating_sub(*at) < window.size {
                    break;
                }
                self.values.pop_front();
            }
        }
    }
}

/// Subscription handler for `ReplaySubject`.
#[derive(Clone)]
pub struct ReplaySubjectReceiver<T>(Rc<RefCell<ReplaySubject<T>>>);

/// Multicasting emitter for `ReplaySubject`.
#[derive(Clone)]
pub struct ReplaySubjectEmitter<T>(Rc<RefCell<ReplaySubject<T>>>);

impl<T: Clone + 'static> ReplaySubjectReceiver<T> {
    /// Returns the number of registered observers.
    pub fn len(&self) -> usize {
        super::len(&self.0)
    }

    /// Returns `true` if no observers are registered, `false` otherwise.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + 'static> Subscribeable for ReplaySubjectReceiver<T> {
    type ObsType = T;

    fn subscribe(&self, v: Subscriber<Self::ObsType>) -> Result<Subscription, RxError> {
        let buffered: Vec<T> = {
            let mut src = self.0.borrow_mut();
            if src.registry.is_closed() {
                return Err(ObservableError::SubjectClosed.into());
            }
            src.trim();
            src.values.iter().map(|(v, _)| v.clone()).collect()
        };
        super::register(&self.0, v, buffered)
    }
}

impl<T: Clone + 'static> Unsubscribeable for ReplaySubjectReceiver<T> {
    fn unsubscribe(&self) -> Result<(), UnsubscriptionError> {
        super::close(&self.0)
    }

    fn is_closed(&self) -> bool {
        self.0.borrow().registry.is_closed()
    }
}

impl<T: Clone + 'static> Observer for ReplaySubjectEmitter<T> {
    type NextFnType = T;

    fn next(&mut self, v: Self::NextFnType) {
        let observers = {
            let mut src = self.0.borrow_mut();
            if !src.registry.is_active() {
                return;
            }
            let now = src.now();
            src.values.push_back((v.clone(), now));
            src.trim();
            src.registry.snapshot()
        };
        super::next_all(observers, v);
    }

    fn error(&mut self, e: RxError) {
        let observers = self.0.borrow_mut().registry.latch_error(e.clone());
        super::error_all(observers, e);
    }

    fn complete(&mut self) {
        let observers = self.0.borrow_mut().registry.latch_complete();
        super::complete_all(observers);
    }
}

impl<T: Clone + 'static> From<ReplaySubjectEmitter<T>> for Subscriber<T> {
    fn from(value: ReplaySubjectEmitter<T>) -> Self {
        Subscriber::from_observer(value)
    }
}

impl<T: Clone + 'static> From<ReplaySubjectReceiver<T>> for Observable<T> {
    fn from(value: ReplaySubjectReceiver<T>) -> Self {
        value.into_observable()
    }
}
