/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crossbeam::{
    deque::{Injector, Steal},
    scope,
};
use scopeguard::{defer, defer_on_unwind};
use std::sync::mpsc::{sync_channel, Receiver};

pub(crate) trait PoolJob: Send {
    type Result: Send;
    fn run(&self) -> Self::Result;
}

enum QueueItem<T: PoolJob> {
    Stop,
    Job(T),
}

pub(crate) struct WorkerPool<T: PoolJob> {
    capacity: usize,
    queue: Injector<QueueItem<T>>,
}

pub(crate) struct Scope<'a, T: PoolJob> {
    pool: &'a WorkerPool<T>,
    pub rx: Receiver<T::Result>,
}

// Jobs can only be enqueued from inside run().
impl<'a, T> Scope<'a, T>
where
    T: PoolJob,
{
    pub fn enqueue(&self, job: T) {
        self.pool.queue.push(QueueItem::Job(job));
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity
    }
}

impl<T> WorkerPool<T>
where
    T: PoolJob,
{
    pub fn with_capacity(capacity: usize) -> Self {
        WorkerPool {
            capacity: capacity.max(1),
            queue: Injector::new(),
        }
    }

    /// Runs `main_thread` with a scope that feeds the workers. Returns Err if any thread panicked.
    pub fn run<F, R>(&self, main_thread: F) -> Result<R, Box<dyn core::any::Any + 'static + Send>>
    where
        F: FnOnce(Scope<T>) -> R,
    {
        // Results are only ever pending for jobs the main thread enqueued, and it never enqueues
        // more than `capacity` at once, so workers do not block on send.
        let (tx, rx) = sync_channel(self.capacity);

        scope(|s| {
            for _ in 0..self.capacity {
                let tx = tx.clone();
                s.spawn(move |_| {
                    defer_on_unwind! {
                        for _ in 0..self.capacity {
                            self.queue.push(QueueItem::Stop);
                        }
                    }

                    loop {
                        match self.queue.steal() {
                            Steal::Success(QueueItem::Stop) => break,
                            Steal::Success(QueueItem::Job(job)) => {
                                let result = job.run();
                                if tx.send(result).is_err() {
                                    break;
                                }
                            }
                            Steal::Empty => std::thread::yield_now(),
                            Steal::Retry => {}
                        }
                    }
                });
            }

            // Workers hold the remaining senders, so rx closes once they all exit.
            drop(tx);

            {
                // Workers stop even if the main thread panics.
                defer!(for _ in 0..self.capacity {
                    self.queue.push(QueueItem::Stop);
                });
                main_thread(Scope { pool: self, rx })
            }
        })
    }
}
