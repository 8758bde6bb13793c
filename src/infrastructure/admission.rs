//! Admission control for concurrently running scans.
//!
//! A single shared atomic counter caps the number of in-flight scan jobs.
//! `try_admit` checks and increments in one atomic step, so two concurrent
//! admits can never both pass the capacity check. The returned permit
//! decrements on drop, which covers every exit path of the pipeline task,
//! including panics.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Returned when scan capacity is exhausted. Informational, not a caller error.
#[derive(Debug, thiserror::Error)]
#[error("scan capacity exhausted: {running}/{max} scans running")]
pub struct AdmissionRejected {
    pub running: usize,
    pub max: usize,
}

/// Shared running-scan counter exposing only admit/release semantics.
#[derive(Debug)]
pub struct AdmissionController {
    running: Arc<AtomicUsize>,
    max_concurrent: usize,
}

impl AdmissionController {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            running: Arc::new(AtomicUsize::new(0)),
            max_concurrent,
        }
    }

    /// Admit a new scan if capacity allows. Never blocks.
    pub fn try_admit(&self) -> Result<AdmissionPermit, AdmissionRejected> {
        let claimed = self
            .running
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                if current >= self.max_concurrent {
                    None
                } else {
                    Some(current + 1)
                }
            });

        match claimed {
            Ok(_) => Ok(AdmissionPermit {
                running: Arc::clone(&self.running),
            }),
            Err(current) => Err(AdmissionRejected {
                running: current,
                max: self.max_concurrent,
            }),
        }
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::Acquire)
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

/// Held for the lifetime of one admitted scan; releases the slot on drop.
#[derive(Debug)]
pub struct AdmissionPermit {
    running: Arc<AtomicUsize>,
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_capacity() {
        let controller = AdmissionController::new(2);
        let a = controller.try_admit().unwrap();
        let _b = controller.try_admit().unwrap();
        assert_eq!(controller.running(), 2);

        let rejected = controller.try_admit().unwrap_err();
        assert_eq!(rejected.running, 2);
        assert_eq!(rejected.max, 2);

        drop(a);
        assert_eq!(controller.running(), 1);
        let _c = controller.try_admit().unwrap();
    }

    #[test]
    fn permit_releases_on_panic_unwind() {
        let controller = Arc::new(AdmissionController::new(1));
        let inner = Arc::clone(&controller);
        let result = std::thread::spawn(move || {
            let _permit = inner.try_admit().unwrap();
            panic!("pipeline blew up");
        })
        .join();
        assert!(result.is_err());
        assert_eq!(controller.running(), 0);
    }

    #[test]
    fn concurrent_admits_never_exceed_capacity() {
        let controller = Arc::new(AdmissionController::new(3));
        let barrier = Arc::new(std::sync::Barrier::new(16));
        let mut handles = Vec::new();
        for _ in 0..16 {
            let c = Arc::clone(&controller);
            let b = Arc::clone(&barrier);
            handles.push(std::thread::spawn(move || {
                b.wait();
                c.try_admit().ok()
            }));
        }
        // Keep the permits alive until we have counted them.
        let permits: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().expect("thread panicked"))
            .collect();
        assert_eq!(permits.len(), 3);
        assert_eq!(controller.running(), 3);
    }
}
