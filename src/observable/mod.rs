//! The `observable` module provides the building blocks for creating and manipulating
//! observables.
//!
//! An [`Observable`] is a lazy producer of values: nothing happens until a
//! [`Subscriber`] subscribes, and every subscription runs the producer anew.
//! Operators from [`ObservableExt`] build new observables on top of existing ones,
//! and the free functions in this module create observables from scratch or
//! combine several of them.

use std::{
    cell::{Cell, OnceCell, RefCell},
    collections::BTreeMap,
    rc::Rc,
    time::Duration,
};

use crate::{
    errors::{ObservableError, RxError, Turn},
    observer::Observer,
    scheduler::{self, Scheduler},
    subscription::subscribe::{Subscribeable, Subscriber, Subscription, TeardownLogic},
};

mod combination;
mod creation;
mod pull;

pub use combination::{combine_latest, combine_latest2, merge};
pub use creation::{empty, from_iter, generate, of, throw_error, timer, timer_on};
pub use pull::{Pull, PullIter, PullResult};

type Producer<T> = dyn Fn(Subscriber<T>) -> Result<TeardownLogic, RxError>;

/// The `Observable` struct represents a source of values that can be observed
/// and transformed.
///
/// An observable wraps a producer function. Each call to `subscribe` runs the
/// producer with the given `Subscriber`; the producer pushes values with `next`,
/// finishes with `complete` or `error`, and returns the `TeardownLogic` that
/// releases whatever it set up.
///
/// Cloning an `Observable` is cheap and shares the producer.
///
/// # Example: basic synchronous `Observable`
///
/// ```no_run
/// use rxpush::subscribe::{Subscriber, TeardownLogic};
/// use rxpush::{Observable, ObservableExt, Observer, Subscribeable};
///
/// // Create a custom observable that emits values from 1 to 10.
/// let emit_10_observable = Observable::new(|mut subscriber: Subscriber<i32>| {
///     for i in 1..=10 {
///         // Synchronous producers stop early once the subscriber is done.
///         if subscriber.is_stopped() {
///             break;
///         }
///         subscriber.next(i);
///     }
///     subscriber.complete();
///
///     // Nothing to release.
///     TeardownLogic::Nil
/// });
///
/// let observer = Subscriber::new(
///     |v| println!("Emitted {}", v),
///     |e| eprintln!("Error {}", e),
///     || println!("Completed"),
/// );
///
/// // Observables are cold: nothing is emitted until this call.
/// let _subscription = emit_10_observable
///     .filter(|v| v % 2 == 0)
///     .map(|v| v * 10)
///     .subscribe(observer);
/// ```
///
/// # Example: `Observable` failing during setup
///
/// A producer created with `try_new` can refuse to start. The error is returned
/// from `subscribe` instead of being delivered through the `error` channel.
///
/// ```no_run
/// use rxpush::subscribe::{Subscriber, TeardownLogic};
/// use rxpush::{Observable, Observer, RxError, Subscribeable};
///
/// let observable = Observable::try_new(|mut o: Subscriber<u8>| {
///     let port: u8 = "300".parse()?;
///     o.next(port);
///     o.complete();
///     Ok(TeardownLogic::Nil)
/// });
///
/// let result = observable.subscribe(Subscriber::on_next(|_| {}));
/// assert!(result.is_err());
/// ```
pub struct Observable<T> {
    subscribe_fn: Rc<Producer<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Observable {
            subscribe_fn: Rc::clone(&self.subscribe_fn),
        }
    }
}

impl<T: 'static> Observable<T> {
    /// Creates a new `Observable` with the provided subscribe function.
    ///
    /// The subscribe function (`sf`) runs once per subscription. It receives the
    /// subscriber, delivers values to it, and returns the cleanup to run when the
    /// subscription is released.
    pub fn new(sf: impl Fn(Subscriber<T>) -> TeardownLogic + 'static) -> Self {
        Observable::try_new(move |s| Ok(sf(s)))
    }

    /// Creates a new `Observable` whose subscribe function may fail.
    ///
    /// An `Err` returned by `sf` is handed back to the caller of `subscribe`
    /// unchanged.
    pub fn try_new(sf: impl Fn(Subscriber<T>) -> Result<TeardownLogic, RxError> + 'static) -> Self {
        Observable {
            subscribe_fn: Rc::new(sf),
        }
    }

    /// Consumes the observable through pulls instead of callbacks.
    ///
    /// The subscription starts with the first pull.
    pub fn into_pull(self) -> PullIter<T> {
        PullIter::new(self)
    }

    /// Subscribes immediately and calls `f` for every value.
    ///
    /// The returned future resolves with `Ok(())` when the observable completes
    /// and with the error when it errors. A failure to subscribe resolves the
    /// future with that failure.
    pub fn for_each(
        &self,
        mut f: impl FnMut(T) + 'static,
    ) -> impl std::future::Future<Output = Result<(), RxError>> {
        let (tx, rx) = tokio::sync::oneshot::channel::<Result<(), RxError>>();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let tx_c = Rc::clone(&tx);

        let subscriber = Subscriber::new(
            move |v| f(v),
            move |e| {
                let tx = tx.borrow_mut().take();
                if let Some(tx) = tx {
                    // The receiver is gone when nobody awaits the future anymore.
                    let _ = tx.send(Err(e));
                }
            },
            move || {
                let tx = tx_c.borrow_mut().take();
                if let Some(tx) = tx {
                    let _ = tx.send(Ok(()));
                }
            },
        );
        let setup = self.subscribe(subscriber);

        async move {
            setup?;
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(ObservableError::Abandoned.into()),
            }
        }
    }
}

impl<T: 'static> Subscribeable for Observable<T> {
    type ObsType = T;

    fn subscribe(&self, v: Subscriber<Self::ObsType>) -> Result<Subscription, RxError> {
        let _turn = Turn::enter();
        match (self.subscribe_fn)(v.clone()) {
            Ok(teardown) => {
                v.add(teardown);
                Ok(v.subscription())
            }
            Err(e) => {
                tracing::trace!(error = %e, "observable failed while subscribing");
                v.release();
                Err(e)
            }
        }
    }
}

// Forwards errors and completion of a new subscriber to `o`; `next` decides what
// reaches `o` for each value.
pub(crate) fn relay<T: 'static, U: 'static>(
    o: &Subscriber<U>,
    mut next: impl FnMut(&mut Subscriber<U>, T) + 'static,
) -> Subscriber<T> {
    let mut o_next = o.clone();
    let mut o_error = o.clone();
    let mut o_complete = o.clone();
    Subscriber::new(
        move |v| next(&mut o_next, v),
        move |e| o_error.error(e),
        move || o_complete.complete(),
    )
}

/// The `ObservableExt` trait provides a set of extension methods that can be applied
/// to observables to transform and manipulate their behavior.
///
/// It is implemented for every cloneable `Subscribeable`, so operators work the
/// same way on observables and on subject receivers.
pub trait ObservableExt<T: 'static>: Subscribeable<ObsType = T> + Clone + 'static {
    /// Converts into a plain `Observable` that subscribes to `self`.
    fn into_observable(self) -> Observable<T> {
        Observable::try_new(move |o| self.subscribe(o).map(TeardownLogic::Wrapped))
    }

    /// Transforms the items emitted by the observable using a transformation
    /// function.
    fn map<U, F>(self, f: F) -> Observable<U>
    where
        F: Fn(T) -> U + 'static,
        U: 'static,
    {
        let f = Rc::new(f);
        Observable::try_new(move |o| {
            let f = Rc::clone(&f);
            let u = relay(&o, move |o, v| o.next(f(v)));
            self.subscribe(u).map(TeardownLogic::Wrapped)
        })
    }

    /// Filters the items emitted by the observable based on a predicate function.
    ///
    /// Only items for which the predicate function returns `true` will be emitted
    /// by the resulting observable.
    fn filter<P>(self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let predicate = Rc::new(predicate);
        Observable::try_new(move |o| {
            let predicate = Rc::clone(&predicate);
            let u = relay(&o, move |o, v| {
                if predicate(&v) {
                    o.next(v);
                }
            });
            self.subscribe(u).map(TeardownLogic::Wrapped)
        })
    }

    /// Maps every item with `f` and emits only the `Some` results.
    fn filter_map<U, F>(self, f: F) -> Observable<U>
    where
        F: Fn(T) -> Option<U> + 'static,
        U: 'static,
    {
        let f = Rc::new(f);
        Observable::try_new(move |o| {
            let f = Rc::clone(&f);
            let u = relay(&o, move |o, v| {
                if let Some(u) = f(v) {
                    o.next(u);
                }
            });
            self.subscribe(u).map(TeardownLogic::Wrapped)
        })
    }

    /// Emits at most the first `n` items emitted by the observable, then
    /// completes and unsubscribes from the source.
    ///
    /// The source is released as soon as the `n`-th item has been forwarded, so a
    /// synchronous source checking `is_stopped` stops emitting right away.
    fn take(self, n: usize) -> Observable<T> {
        Observable::try_new(move |mut o: Subscriber<T>| {
            if n == 0 {
                o.complete();
                return Ok(TeardownLogic::Nil);
            }

            let upstream: Rc<OnceCell<Subscription>> = Rc::default();
            let up = Rc::clone(&upstream);
            let mut seen = 0;
            let u = relay(&o, move |o, v| {
                seen += 1;
                if seen <= n {
                    o.next(v);
                }
                if seen >= n {
                    o.complete();
                    if let Some(source) = up.get() {
                        source.release();
                    }
                }
            });
            let _ = upstream.set(u.subscription());
            self.subscribe(u).map(TeardownLogic::Wrapped)
        })
    }

    /// Merges `self` with the given observables; see [`merge`].
    fn merge(self, sources: Vec<Observable<T>>) -> Observable<T> {
        combination::merge(
            std::iter::once(self.into_observable())
                .chain(sources)
                .collect(),
        )
    }

    /// Maps each item to an inner observable and mirrors only the most recent one.
    ///
    /// Every new item unsubscribes the active inner observable before `project` is
    /// subscribed for the new item. The output completes once the source and the
    /// latest inner observable have both completed. An inner error errors the output
    /// and cancels the source; a source error cancels the active inner observable.
    ///
    /// # Parameters
    /// - `project`: A closure that maps each source item to an observable.
    ///
    /// # Returns
    /// An observable that emits the items from the most recently projected inner
    /// observable.
    fn switch_map<R: 'static, F>(self, project: F) -> Observable<R>
    where
        F: Fn(T) -> Observable<R> + 'static,
    {
        self.switch_map_indexed(move |v, _| project(v))
    }

    /// Like [`switch_map`](ObservableExt::switch_map), but `project` also gets the
    /// position of the item in the source, counted from zero for each
    /// subscription.
    fn switch_map_indexed<R: 'static, F>(self, project: F) -> Observable<R>
    where
        F: Fn(T, usize) -> Observable<R> + 'static,
    {
        let project = Rc::new(project);
        Observable::try_new(move |o| {
            let project = Rc::clone(&project);
            let flatten = Flatten::new(o);
            let f = flatten.clone();
            let index = Cell::new(0);
            let u = flatten.source_subscriber(move |v| {
                f.cancel_inner();
                let i = index.replace(index.get() + 1);
                f.subscribe_inner(project(v, i));
            });
            flatten.attach_source(&self, u)
        })
    }

    /// Maps each item to an inner observable, ignoring items that arrive while an
    /// inner observable is still active.
    ///
    /// `project` is not called for ignored items. The output completes once the
    /// source has completed and no inner observable is active. Errors behave as in
    /// [`switch_map`](ObservableExt::switch_map).
    fn exhaust_map<R: 'static, F>(self, project: F) -> Observable<R>
    where
        F: Fn(T) -> Observable<R> + 'static,
    {
        self.exhaust_map_indexed(move |v, _| project(v))
    }

    /// Like [`exhaust_map`](ObservableExt::exhaust_map), but `project` also gets
    /// the number of items projected before this one. Ignored items are not
    /// counted.
    fn exhaust_map_indexed<R: 'static, F>(self, project: F) -> Observable<R>
    where
        F: Fn(T, usize) -> Observable<R> + 'static,
    {
        let project = Rc::new(project);
        Observable::try_new(move |o| {
            let project = Rc::clone(&project);
            let flatten = Flatten::new(o);
            let f = flatten.clone();
            let index = Cell::new(0);
            let u = flatten.source_subscriber(move |v| {
                if f.state.borrow().inner_active {
                    tracing::trace!("exhaust_map: item ignored while inner is active");
                    return;
                }
                let i = index.replace(index.get() + 1);
                f.subscribe_inner(project(v, i));
            });
            flatten.attach_source(&self, u)
        })
    }

    /// Recovers from an error by switching to another observable.
    ///
    /// When the source errors it is unsubscribed, and `selector` is called with the
    /// error and the source itself (so returning the source retries it). The
    /// observable returned by the selector is subscribed in place of the source,
    /// with the same recovery applied to it. Completion is relayed unchanged.
    fn catch_error<F>(self, selector: F) -> Observable<T>
    where
        F: Fn(RxError, Observable<T>) -> Observable<T> + 'static,
    {
        catching(self.into_observable(), Rc::new(selector))
    }

    /// Delays each emission by `num_of_ms` milliseconds on the default scheduler.
    ///
    /// See [`delay_on`](ObservableExt::delay_on).
    fn delay(self, num_of_ms: u64) -> Observable<T> {
        self.delay_on(num_of_ms, scheduler::default_scheduler())
    }

    /// Delays each emission by `num_of_ms` milliseconds on `scheduler`.
    ///
    /// Values keep their arrival order. A completion or error arriving while values
    /// are still waiting is held back until the last of them has been emitted.
    /// Unsubscribing cancels every pending emission.
    fn delay_on(self, num_of_ms: u64, scheduler: Rc<dyn Scheduler>) -> Observable<T> {
        let delay = Duration::from_millis(num_of_ms);
        Observable::try_new(move |o: Subscriber<T>| {
            let state = Rc::new(RefCell::new(DelayState::default()));

            let (st, sched, out) = (Rc::clone(&state), Rc::clone(&scheduler), o.clone());
            let mut u = Subscriber::on_next(move |v: T| {
                let id = st.borrow_mut().next_id();
                let (st_task, mut out) = (Rc::clone(&st), out.clone());
                let task = sched.schedule(
                    delay,
                    Box::new(move || {
                        out.next(v);
                        let terminal = {
                            let mut st = st_task.borrow_mut();
                            st.pending.remove(&id);
                            if st.pending.is_empty() {
                                st.terminal.take()
                            } else {
                                None
                            }
                        };
                        if let Some(terminal) = terminal {
                            terminal.deliver(&mut out);
                        }
                    }),
                );
                // A task only runs after `schedule` returns, so the entry is in place.
                st.borrow_mut().pending.insert(id, task);
            });
            let (st, mut out) = (Rc::clone(&state), o.clone());
            u.on_error(move |e| {
                let idle = st.borrow_mut().hold(Terminal::Error(e));
                if let Some(terminal) = idle {
                    terminal.deliver(&mut out);
                }
            });
            let (st, mut out) = (Rc::clone(&state), o.clone());
            u.on_complete(move || {
                let idle = st.borrow_mut().hold(Terminal::Complete);
                if let Some(terminal) = idle {
                    terminal.deliver(&mut out);
                }
            });

            let source = self.subscribe(u)?;
            let teardown = Subscription::default();
            teardown.add(source);
            teardown.add(TeardownLogic::logic(move || {
                let pending = std::mem::take(&mut state.borrow_mut().pending);
                for (_, task) in pending {
                    task.release();
                }
            }));
            Ok(TeardownLogic::Wrapped(teardown))
        })
    }
}

impl<O, T: 'static> ObservableExt<T> for O where O: Subscribeable<ObsType = T> + Clone + 'static {}

enum Terminal {
    Complete,
    Error(RxError),
}

impl Terminal {
    fn deliver<T>(self, o: &mut Subscriber<T>) {
        match self {
            Terminal::Complete => o.complete(),
            Terminal::Error(e) => o.error(e),
        }
    }
}

#[derive(Default)]
struct DelayState {
    pending: BTreeMap<u64, Subscription>,
    terminal: Option<Terminal>,
    ids: u64,
}

impl DelayState {
    fn next_id(&mut self) -> u64 {
        let id = self.ids;
        self.ids += 1;
        id
    }

    // Returns the terminal signal back when nothing is in flight.
    fn hold(&mut self, terminal: Terminal) -> Option<Terminal> {
        if self.pending.is_empty() {
            Some(terminal)
        } else {
            self.terminal = Some(terminal);
            None
        }
    }
}

#[derive(Default)]
struct FlattenState {
    inner: Option<Subscription>,
    inner_active: bool,
    source_done: bool,
}

// Shared machinery of switch_map and exhaust_map.
struct Flatten<R> {
    out: Subscriber<R>,
    state: Rc<RefCell<FlattenState>>,
    source: Rc<OnceCell<Subscription>>,
    group: Subscription,
}

impl<R> Clone for Flatten<R> {
    fn clone(&self) -> Self {
        Flatten {
            out: self.out.clone(),
            state: Rc::clone(&self.state),
            source: Rc::clone(&self.source),
            group: self.group.clone(),
        }
    }
}

impl<R: 'static> Flatten<R> {
    fn new(out: Subscriber<R>) -> Self {
        Flatten {
            out,
            state: Rc::default(),
            source: Rc::default(),
            group: Subscription::default(),
        }
    }

    fn source_subscriber<T: 'static>(&self, next: impl FnMut(T) + 'static) -> Subscriber<T> {
        let (on_error, on_complete) = (self.clone(), self.clone());
        let mut u = Subscriber::on_next(next);
        u.on_error(move |e| {
            on_error.cancel_inner();
            on_error.out.clone().error(e);
        });
        u.on_complete(move || {
            let idle = {
                let mut st = on_complete.state.borrow_mut();
                st.source_done = true;
                !st.inner_active
            };
            if idle {
                on_complete.out.clone().complete();
            }
        });
        let _ = self.source.set(u.subscription());
        u
    }

    fn attach_source<S>(&self, source: &S, u: Subscriber<S::ObsType>) -> Result<TeardownLogic, RxError>
    where
        S: Subscribeable,
    {
        match source.subscribe(u) {
            Ok(s) => {
                self.group.add(s);
                Ok(TeardownLogic::Wrapped(self.group.clone()))
            }
            Err(e) => {
                self.group.release();
                Err(e)
            }
        }
    }

    fn subscribe_inner(&self, inner: Observable<R>) {
        self.state.borrow_mut().inner_active = true;

        let (on_error, on_complete) = (self.clone(), self.clone());
        let mut out = self.out.clone();
        let inner_subscriber = Subscriber::new(
            move |v| out.next(v),
            move |e| on_error.fail(e),
            move || {
                let done = {
                    let mut st = on_complete.state.borrow_mut();
                    st.inner_active = false;
                    st.inner = None;
                    st.source_done
                };
                if done {
                    on_complete.out.clone().complete();
                }
            },
        );

        match inner.subscribe(inner_subscriber) {
            Ok(s) if !s.is_closed() => {
                self.group.add(s.clone());
                self.state.borrow_mut().inner = Some(s);
            }
            Ok(_) => {}
            Err(e) => self.fail(e),
        }
    }

    fn cancel_inner(&self) {
        let inner = {
            let mut st = self.state.borrow_mut();
            st.inner_active = false;
            st.inner.take()
        };
        if let Some(inner) = inner {
            inner.release();
        }
    }

    fn fail(&self, e: RxError) {
        if let Some(source) = self.source.get() {
            source.release();
        }
        self.cancel_inner();
        self.out.clone().error(e);
    }
}

type Selector<T> = Rc<dyn Fn(RxError, Observable<T>) -> Observable<T>>;

fn catching<T: 'static>(source: Observable<T>, selector: Selector<T>) -> Observable<T> {
    Observable::try_new(move |o: Subscriber<T>| {
        let upstream: Rc<OnceCell<Subscription>> = Rc::default();

        let mut u = relay(&o, |o, v| o.next(v));
        let (src, sel, up, out) = (
            source.clone(),
            Rc::clone(&selector),
            Rc::clone(&upstream),
            o.clone(),
        );
        u.on_error(move |e| {
            if let Some(failed) = up.get() {
                failed.release();
            }
            let replacement = catching(sel(e, src.clone()), Rc::clone(&sel));
            match replacement.subscribe(relay(&out, |o, v| o.next(v))) {
                Ok(s) => {
                    out.add(s);
                }
                Err(setup) => out.clone().error(setup),
            }
        });
        let _ = upstream.set(u.subscription());

        source.subscribe(u).map(TeardownLogic::Wrapped)
    })
}

#[cfg(test)]
mod tests;
