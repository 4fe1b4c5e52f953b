use std::{cell::RefCell, rc::Rc};

use rxpush::subscribe::Subscriber;

pub type Register = Rc<RefCell<Vec<i32>>>;

pub fn register_emissions_subscriber() -> (
    Vec<impl FnOnce() -> Subscriber<i32>>,
    Register,
    Register,
    Register,
) {
    let nexts: Register = Rc::new(RefCell::new(Vec::with_capacity(5)));
    let nexts_c = Rc::clone(&nexts);

    let completes: Register = Rc::new(RefCell::new(Vec::with_capacity(5)));
    let completes_c = Rc::clone(&completes);

    let errors: Register = Rc::new(RefCell::new(Vec::with_capacity(5)));
    let errors_c = Rc::clone(&errors);

    let make_subscriber = vec![
        move || {
            let (nexts, errors, completes) = (
                Rc::clone(&nexts_c),
                Rc::clone(&errors_c),
                Rc::clone(&completes_c),
            );
            Subscriber::new(
                move |n| {
                    // Track next() calls.
                    nexts.borrow_mut().push(n);
                },
                move |_| {
                    // Track error() calls.
                    errors.borrow_mut().push(1);
                },
                move || {
                    // Track complete() calls.
                    completes.borrow_mut().push(1);
                },
            )
        };
        10
    ];
    (make_subscriber, nexts, completes, errors)
}
