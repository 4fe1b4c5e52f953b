use std::{cell::Cell, rc::Rc};

use rxpush::{
    subscribe::{Subscriber, TeardownLogic},
    Observable, Observer,
};

/// Emits `0..=end` synchronously, stopping early once the subscriber is stopped.
///
/// `last_emit` records the last value handed to the subscriber and `released`
/// flips when the subscription's teardown runs.
pub fn generate_u32_observable(
    end: u32,
    last_emit: Rc<Cell<Option<u32>>>,
    released: Rc<Cell<bool>>,
) -> Observable<u32> {
    Observable::new(move |mut o: Subscriber<u32>| {
        for i in 0..=end {
            if o.is_stopped() {
                break;
            }
            last_emit.set(Some(i));
            o.next(i);
        }
        o.complete();

        let released = Rc::clone(&released);
        TeardownLogic::logic(move || released.set(true))
    })
}
