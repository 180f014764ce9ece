use std::sync::mpsc;
use std::thread;

type Job = Box<dyn FnOnce() + Send>;

/// Runs posted jobs in order on one worker thread.
///
/// All notifications of a session and its channels go through here, so they
/// never reach the media layer from inside one of its own calls. The worker
/// exits once every clone has been dropped and the queue is drained.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    jobs: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Start the worker. If the thread cannot be spawned the dispatcher is
    /// inert: posted jobs are dropped.
    pub(crate) fn spawn(name: &str) -> Self {
        let (jobs, queue) = mpsc::channel::<Job>();
        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            for job in queue {
                job();
            }
            tracing::trace!("dispatcher exited");
        });
        if let Err(e) = spawned {
            tracing::error!(error = %e, "could not spawn loopback dispatcher");
        }
        Self { jobs }
    }

    pub(crate) fn post(&self, job: impl FnOnce() + Send + 'static) {
        if self.jobs.send(Box::new(job)).is_err() {
            tracing::debug!("dispatcher gone, job dropped");
        }
    }
}
