use parking_lot::Mutex;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};

/// The series waiting to be migrated, each ready at a point in time
///
/// Fresh series are ready immediately; a series that failed is pushed back with a delay. Workers
/// wait in [`pop`](Self::pop) until an item is ready. Items ready at the same time come out in the
/// order they were pushed.
///
/// It is cheap to clone; all clones share the same queue.
#[derive(Debug)]
pub(crate) struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

#[derive(Debug)]
struct Inner<T> {
    heap: Mutex<Heap<T>>,
    notify: Notify,
}

#[derive(Debug)]
struct Heap<T> {
    items: BinaryHeap<Reverse<Item<T>>>,
    next_seq: u64,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> WorkQueue<T>
where
    T: Send + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                heap: Mutex::new(Heap {
                    items: BinaryHeap::new(),
                    next_seq: 0,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Push an item that becomes ready at `at`
    pub(crate) fn push_at(&self, at: Instant, item: T) {
        {
            let mut heap = self.inner.heap.lock();
            let seq = heap.next_seq;
            heap.next_seq += 1;
            heap.items.push(Reverse(Item { at, seq, item }));
        }
        self.inner.notify.notify_one();
    }

    pub(crate) fn push(&self, item: T) {
        self.push_at(Instant::now(), item);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.heap.lock().items.len()
    }

    /// Wait for the next ready item
    pub(crate) async fn pop(&self) -> T {
        loop {
            let next_at = {
                let mut heap = self.inner.heap.lock();
                match heap.items.peek().map(|Reverse(item)| item.at) {
                    Some(at) if at <= Instant::now() => {
                        let Reverse(item) = heap.items.pop().expect("peeked item is present");
                        // another worker may be waiting for an item that is already ready
                        if !heap.items.is_empty() {
                            self.inner.notify.notify_one();
                        }
                        return item.item;
                    }
                    next_at => next_at,
                }
            };

            match next_at {
                Some(at) => {
                    tokio::select! {
                        _ = sleep_until(at) => {}
                        _ = self.inner.notify.notified() => {}
                    }
                }
                None => self.inner.notify.notified().await,
            }
        }
    }
}

/// An item with the time it becomes ready, ordered by that time and then by push order
#[derive(Debug)]
struct Item<T> {
    at: Instant,
    seq: u64,
    item: T,
}

impl<T> Eq for Item<T> {}

impl<T> PartialEq<Self> for Item<T> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<T> PartialOrd<Self> for Item<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Item<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}
