use std::sync::mpsc;

/// Downstream consumer of the data tuples a [`Reservoir`](super::Reservoir)
/// drains.
///
/// `put` is called in delivery order from the thread running the sweep. It
/// should not block for long: a slow sink holds back the sweep and with it the
/// whole stream.
pub trait Sink<T>: Send + Sync {
    fn put(&self, tuple: T);
}

impl<T, F> Sink<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn put(&self, tuple: T) {
        self(tuple)
    }
}

impl<T: Send> Sink<T> for mpsc::Sender<T> {
    fn put(&self, tuple: T) {
        if self.send(tuple).is_err() {
            tracing::debug!("Sink receiver is gone, dropping tuple");
        }
    }
}
