use crate::errors::RxError;

/// Receiver of the three kinds of notifications an observable can deliver.
pub trait Observer {
    type NextFnType;

    fn next(&mut self, _: Self::NextFnType);
    fn complete(&mut self);
    fn error(&mut self, _: RxError);
}
