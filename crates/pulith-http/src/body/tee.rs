//! Fan-out of one chunk stream into two independent branches.
//!
//! Whichever branch polls the source first receives the chunk directly and
//! queues a copy for its sibling. Chunks stay queued until the sibling reads
//! them or is dropped, so a slow branch only costs memory, never progress.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Wake, Waker};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use super::BoxStream;
use crate::error::Result;

type Chunk = Result<Bytes>;

struct Shared {
    source: Option<BoxStream<'static, Chunk>>,
    queues: [VecDeque<Chunk>; 2],
    alive: [bool; 2],
}

/// Waker handed to the source: wakes every branch parked on it.
#[derive(Default)]
struct FanoutWaker {
    parked: Mutex<[Option<Waker>; 2]>,
}

impl FanoutWaker {
    fn park(&self, branch: usize, waker: &Waker) {
        let mut parked = self.parked.lock().unwrap_or_else(PoisonError::into_inner);
        match &parked[branch] {
            Some(existing) if existing.will_wake(waker) => {}
            _ => parked[branch] = Some(waker.clone()),
        }
    }

    fn wake_branch(&self, branch: usize) {
        let waker = self.parked.lock().unwrap_or_else(PoisonError::into_inner)[branch].take();
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

impl Wake for FanoutWaker {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        let wakers: Vec<Waker> = self
            .parked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        for waker in wakers {
            waker.wake();
        }
    }
}

struct Branch {
    index: usize,
    shared: Arc<Mutex<Shared>>,
    waker: Arc<FanoutWaker>,
}

impl Branch {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Stream for Branch {
    type Item = Chunk;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let me = this.index;
        let other = 1 - me;
        let mut shared = this.lock();

        if let Some(chunk) = shared.queues[me].pop_front() {
            return Poll::Ready(Some(chunk));
        }

        let Some(source) = shared.source.as_mut() else {
            return Poll::Ready(None);
        };

        this.waker.park(me, cx.waker());
        let fanout = Waker::from(Arc::clone(&this.waker));
        let mut source_cx = Context::from_waker(&fanout);

        match source.poll_next_unpin(&mut source_cx) {
            Poll::Ready(Some(chunk)) => {
                let failed = chunk.is_err();
                if shared.alive[other] {
                    tracing::trace!(branch = me, "tee queued chunk for sibling");
                    shared.queues[other].push_back(chunk.clone());
                }
                if failed {
                    shared.source = None;
                }
                drop(shared);
                this.waker.wake_branch(other);
                Poll::Ready(Some(chunk))
            }
            Poll::Ready(None) => {
                shared.source = None;
                drop(shared);
                this.waker.wake_branch(other);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for Branch {
    fn drop(&mut self) {
        let mut shared = self.lock();
        shared.alive[self.index] = false;
        shared.queues[self.index].clear();
        if !shared.alive.iter().any(|alive| *alive) {
            shared.source = None;
        }
    }
}

/// Split `source` into two branches that each observe every chunk.
pub(crate) fn tee(
    source: BoxStream<'static, Chunk>,
) -> (BoxStream<'static, Chunk>, BoxStream<'static, Chunk>) {
    let shared = Arc::new(Mutex::new(Shared {
        source: Some(source),
        queues: [VecDeque::new(), VecDeque::new()],
        alive: [true, true],
    }));
    let waker = Arc::new(FanoutWaker::default());

    let left = Branch {
        index: 0,
        shared: Arc::clone(&shared),
        waker: Arc::clone(&waker),
    };
    let right = Branch {
        index: 1,
        shared,
        waker,
    };
    (Box::pin(left), Box::pin(right))
}
