//! Integration test suite for the Corten promise engine
//!
//! This crate provides integration tests that drive the engine the way an
//! embedding would: its own job queue, its own event loop and worker
//! threads settling promises.

use promise_engine::{Context, Job, JobEnqueuer, JobKind};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Re-export components for test convenience
pub mod components {
    pub use core_types;
    pub use promise_engine;
}

/// Embedding-owned job queue that records the kind of every job it runs.
#[derive(Default)]
pub struct TestHost {
    jobs: RefCell<VecDeque<Job>>,
    ran: RefCell<Vec<JobKind>>,
}

impl TestHost {
    /// Creates a host and a context whose jobs go to it.
    pub fn context() -> (Context, Rc<TestHost>) {
        let host = Rc::new(TestHost::default());
        let cx = Context::builder()
            .callbacks(
                promise_engine::ContextCallbacks::default().with_job_enqueuer(host.clone()),
            )
            .build();
        (cx, host)
    }

    /// Runs host jobs until none remain. Returns how many ran.
    pub fn drain(&self, cx: &Context) -> usize {
        let mut ran = 0;
        loop {
            let job = self.jobs.borrow_mut().pop_front();
            let Some(job) = job else {
                break;
            };
            self.ran.borrow_mut().push(job.kind());
            job.run(cx);
            ran += 1;
        }
        cx.notify_turn_completed();
        ran
    }

    /// Kinds of the jobs run so far, in order.
    pub fn ran_kinds(&self) -> Vec<JobKind> {
        self.ran.borrow().clone()
    }
}

impl JobEnqueuer for TestHost {
    fn enqueue(&self, _cx: &Context, job: Job) -> Result<(), Job> {
        self.jobs.borrow_mut().push_back(job);
        Ok(())
    }

    fn is_empty(&self) -> Option<bool> {
        Some(self.jobs.borrow().is_empty())
    }
}
