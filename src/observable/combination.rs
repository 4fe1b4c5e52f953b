use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use super::{Observable, ObservableExt};
use crate::{
    observer::Observer,
    subscription::subscribe::{Subscribeable, Subscriber, Subscription, TeardownLogic},
};

/// Mirrors every value of every source as it arrives.
///
/// All sources are subscribed in order. The first error unsubscribes the other
/// sources and errors the output; the output completes once every source has
/// completed, or immediately when `sources` is empty.
pub fn merge<T: 'static>(sources: Vec<Observable<T>>) -> Observable<T> {
    let sources = Rc::new(sources);
    Observable::try_new(move |mut o: Subscriber<T>| {
        if sources.is_empty() {
            o.complete();
            return Ok(TeardownLogic::Nil);
        }

        let group = Subscription::default();
        let remaining = Rc::new(Cell::new(sources.len()));

        for source in sources.iter() {
            if group.is_closed() || o.is_stopped() {
                break;
            }

            let mut o_next = o.clone();
            let (mut o_error, group_e) = (o.clone(), group.clone());
            let (mut o_complete, remaining) = (o.clone(), Rc::clone(&remaining));
            let inner = Subscriber::new(
                move |v| o_next.next(v),
                move |e| {
                    group_e.release();
                    o_error.error(e);
                },
                move || {
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        o_complete.complete();
                    }
                },
            );

            match source.subscribe(inner) {
                Ok(s) => {
                    group.add(s);
                }
                Err(e) => {
                    group.release();
                    return Err(e);
                }
            }
        }
        Ok(TeardownLogic::Wrapped(group))
    })
}

struct Latest<T> {
    values: Vec<Option<T>>,
    filled: usize,
    completed: usize,
}

/// Emits the latest value of every source each time any of them emits.
///
/// Nothing is emitted until every source has produced at least one value. The
/// output completes when all sources have completed, or as soon as a source
/// completes without ever emitting, since no combination can be formed anymore.
/// An error from any source unsubscribes the rest and errors the output.
pub fn combine_latest<T: Clone + 'static>(sources: Vec<Observable<T>>) -> Observable<Vec<T>> {
    let sources = Rc::new(sources);
    Observable::try_new(move |mut o: Subscriber<Vec<T>>| {
        let n = sources.len();
        if n == 0 {
            o.complete();
            return Ok(TeardownLogic::Nil);
        }

        let state = Rc::new(RefCell::new(Latest {
            values: vec![None; n],
            filled: 0,
            completed: 0,
        }));
        let group = Subscription::default();

        for (index, source) in sources.iter().enumerate() {
            if group.is_closed() || o.is_stopped() {
                break;
            }

            let (mut o_next, st_next) = (o.clone(), Rc::clone(&state));
            let (mut o_error, group_e) = (o.clone(), group.clone());
            let (mut o_complete, st_complete, group_c) =
                (o.clone(), Rc::clone(&state), group.clone());
            let inner = Subscriber::new(
                move |v| {
                    let combined = {
                        let mut st = st_next.borrow_mut();
                        if st.values[index].is_none() {
                            st.filled += 1;
                        }
                        st.values[index] = Some(v);
                        if st.filled == n {
                            Some(st.values.iter().flatten().cloned().collect::<Vec<T>>())
                        } else {
                            None
                        }
                    };
                    if let Some(combined) = combined {
                        o_next.next(combined);
                    }
                },
                move |e| {
                    group_e.release();
                    o_error.error(e);
                },
                move || {
                    let finished = {
                        let mut st = st_complete.borrow_mut();
                        st.completed += 1;
                        st.values[index].is_none() || st.completed == n
                    };
                    if finished {
                        o_complete.complete();
                        group_c.release();
                    }
                },
            );

            match source.subscribe(inner) {
                Ok(s) => {
                    group.add(s);
                }
                Err(e) => {
                    group.release();
                    return Err(e);
                }
            }
        }
        Ok(TeardownLogic::Wrapped(group))
    })
}

#[derive(Clone)]
enum Slot<A, B> {
    First(A),
    Second(B),
}

/// [`combine_latest`] for two sources of different item types.
pub fn combine_latest2<A, B>(a: Observable<A>, b: Observable<B>) -> Observable<(A, B)>
where
    A: Clone + 'static,
    B: Clone + 'static,
{
    combine_latest(vec![a.map(Slot::First), b.map(Slot::Second)]).filter_map(|slots| {
        match <[Slot<A, B>; 2]>::try_from(slots) {
            Ok([Slot::First(a), Slot::Second(b)]) => Some((a, b)),
            _ => None,
        }
    })
}
