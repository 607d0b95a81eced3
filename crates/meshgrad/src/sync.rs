//! Hand-off between whoever produces control-grid updates and the render thread.
//!
//! Producers hold a [`Submitter`]; the render thread owns the
//! [`RenderSyncBridge`] and the authoritative [`ControlGrid`]. Only one pending
//! snapshot exists at a time, so a burst of submissions collapses into the
//! newest one. Positions and colors travel together in the same snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{Sender, TrySendError};

use crate::types::{ControlGrid, GridDims, MeshError};

/// Wakes the render side after a snapshot lands.
pub trait RedrawNotifier: Send + Sync {
    fn request_redraw(&self);
}

/// Notifier for hosts that poll [`RenderSyncBridge::apply_pending`] themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl RedrawNotifier for NoopNotifier {
    fn request_redraw(&self) {}
}

impl RedrawNotifier for Sender<()> {
    fn request_redraw(&self) {
        match self.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => {
                tracing::trace!("redraw receiver dropped");
            }
        }
    }
}

/// Adapts a closure into a [`RedrawNotifier`].
pub struct FnNotifier<F>(pub F);

impl<F> RedrawNotifier for FnNotifier<F>
where
    F: Fn() + Send + Sync,
{
    fn request_redraw(&self) {
        (self.0)()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub submitted: u64,
    pub applied: u64,
}

struct Snapshot {
    positions: Vec<f32>,
    colors: Vec<f32>,
}

impl Snapshot {
    fn zeroed(dims: GridDims) -> Self {
        Self {
            positions: vec![0.0; dims.position_len()],
            colors: vec![0.0; dims.color_len()],
        }
    }
}

#[derive(Default)]
struct Slot {
    pending: Option<Snapshot>,
    spare: Option<Snapshot>,
}

struct Shared {
    dims: GridDims,
    slot: Mutex<Slot>,
    submitted: AtomicU64,
    applied: AtomicU64,
    notifier: Box<dyn RedrawNotifier>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        // Slot contents are plain buffers; a panicked writer cannot leave them torn.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> SyncStats {
        SyncStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
        }
    }
}

/// Producer handle. Cheap to clone and usable from any thread.
#[derive(Clone)]
pub struct Submitter {
    shared: Arc<Shared>,
}

impl Submitter {
    pub fn dims(&self) -> GridDims {
        self.shared.dims
    }

    /// Validates both arrays, then copies them into the pending snapshot.
    ///
    /// Never waits on rendering. A mismatched length is rejected before
    /// anything is copied, so the render side never sees a partial update.
    pub fn submit(&self, positions: &[f32], colors: &[f32]) -> Result<(), MeshError> {
        let dims = self.shared.dims;
        dims.check_lengths(positions, colors)?;

        {
            let mut guard = self.shared.lock();
            let Slot { pending, spare } = &mut *guard;
            let snapshot = pending.get_or_insert_with(|| {
                spare.take().unwrap_or_else(|| Snapshot::zeroed(dims))
            });
            snapshot.positions.copy_from_slice(positions);
            snapshot.colors.copy_from_slice(colors);
        }

        self.shared.submitted.fetch_add(1, Ordering::Relaxed);
        self.shared.notifier.request_redraw();
        Ok(())
    }

    pub fn stats(&self) -> SyncStats {
        self.shared.stats()
    }
}

/// Render-side half: owns the grid and applies the freshest snapshot.
pub struct RenderSyncBridge {
    grid: ControlGrid,
    shared: Arc<Shared>,
}

impl RenderSyncBridge {
    pub fn new(grid: ControlGrid, notifier: impl RedrawNotifier + 'static) -> (Self, Submitter) {
        let shared = Arc::new(Shared {
            dims: grid.dims(),
            slot: Mutex::new(Slot::default()),
            submitted: AtomicU64::new(0),
            applied: AtomicU64::new(0),
            notifier: Box::new(notifier),
        });
        let submitter = Submitter {
            shared: shared.clone(),
        };
        (Self { grid, shared }, submitter)
    }

    pub fn grid(&self) -> &ControlGrid {
        &self.grid
    }

    pub fn submitter(&self) -> Submitter {
        Submitter {
            shared: self.shared.clone(),
        }
    }

    /// Swaps the pending snapshot, if any, into the grid. The grid's previous
    /// buffers become the spare for the next submission.
    pub fn apply_pending(&mut self) -> bool {
        let mut guard = self.shared.lock();
        let Some(mut snapshot) = guard.pending.take() else {
            return false;
        };
        let (positions, colors) = self.grid.buffers_mut();
        std::mem::swap(positions, &mut snapshot.positions);
        std::mem::swap(colors, &mut snapshot.colors);
        guard.spare = Some(snapshot);
        drop(guard);

        self.shared.applied.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn stats(&self) -> SyncStats {
        self.shared.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    fn bridge(width: u32, height: u32) -> (RenderSyncBridge, Submitter) {
        let dims = GridDims::new(width, height).unwrap();
        RenderSyncBridge::new(ControlGrid::lattice(dims), NoopNotifier)
    }

    fn filled(dims: GridDims, value: f32) -> (Vec<f32>, Vec<f32>) {
        (vec![value; dims.position_len()], vec![value; dims.color_len()])
    }

    #[test]
    fn apply_without_submission_is_a_no_op() {
        let (mut bridge, _submitter) = bridge(3, 3);
        let before = bridge.grid().clone();
        assert!(!bridge.apply_pending());
        assert_eq!(bridge.grid(), &before);
        assert_eq!(bridge.stats(), SyncStats::default());
    }

    #[test]
    fn bursts_coalesce_to_the_latest_snapshot() {
        let (mut bridge, submitter) = bridge(3, 2);
        let dims = submitter.dims();
        for value in [0.1, 0.2, 0.3] {
            let (p, c) = filled(dims, value);
            submitter.submit(&p, &c).unwrap();
        }
        assert!(bridge.apply_pending());
        assert!(bridge.grid().positions().iter().all(|&v| v == 0.3));
        assert!(bridge.grid().colors().iter().all(|&v| v == 0.3));
        assert!(!bridge.apply_pending());
        assert_eq!(
            bridge.stats(),
            SyncStats {
                submitted: 3,
                applied: 1
            }
        );
    }

    #[test]
    fn mismatched_submission_changes_nothing() {
        let (mut bridge, submitter) = bridge(2, 2);
        let before = bridge.grid().clone();
        let err = submitter.submit(&[0.5; 8], &[0.5; 12]).unwrap_err();
        assert!(matches!(err, MeshError::LengthMismatch { what: "colors", .. }));
        assert!(submitter.submit(&[0.5; 7], &[0.5; 16]).is_err());
        assert!(!bridge.apply_pending());
        assert_eq!(bridge.grid(), &before);
        assert_eq!(submitter.stats().submitted, 0);
    }

    #[test]
    fn steady_state_recycles_two_buffers() {
        let (mut bridge, submitter) = bridge(4, 4);
        let dims = submitter.dims();
        let mut seen = HashSet::new();
        for step in 0..8 {
            let (p, c) = filled(dims, step as f32);
            submitter.submit(&p, &c).unwrap();
            assert!(bridge.apply_pending());
            seen.insert(bridge.grid().positions().as_ptr() as usize);
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn concurrent_producer_never_tears() {
        let (mut bridge, submitter) = bridge(5, 4);
        let dims = submitter.dims();
        const LAST: u32 = 2_000;

        let producer = thread::spawn(move || {
            for step in 1..=LAST {
                let value = step as f32;
                let (p, c) = filled(dims, value);
                submitter.submit(&p, &c).unwrap();
            }
        });

        let mut last_seen = 0.0_f32;
        let check = |grid: &ControlGrid, last_seen: &mut f32| {
            let first = grid.positions()[0];
            assert!(grid.positions().iter().all(|&v| v == first), "torn positions");
            assert!(grid.colors().iter().all(|&v| v == first), "colors from another snapshot");
            assert!(first >= *last_seen, "snapshots went backwards");
            *last_seen = first;
        };

        while !producer.is_finished() {
            if bridge.apply_pending() {
                check(bridge.grid(), &mut last_seen);
            }
        }
        producer.join().unwrap();
        bridge.apply_pending();
        check(bridge.grid(), &mut last_seen);
        assert_eq!(last_seen, LAST as f32);
        assert_eq!(bridge.stats().submitted, LAST as u64);
    }

    #[test]
    fn notifiers_fire_on_every_submit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let dims = GridDims::new(2, 3).unwrap();
        let (_bridge, submitter) = RenderSyncBridge::new(
            ControlGrid::lattice(dims),
            FnNotifier(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let (p, c) = filled(dims, 0.5);
        submitter.submit(&p, &c).unwrap();
        submitter.clone().submit(&p, &c).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn channel_notifier_never_blocks_when_full() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let dims = GridDims::new(2, 2).unwrap();
        let (_bridge, submitter) = RenderSyncBridge::new(ControlGrid::lattice(dims), tx);
        let (p, c) = filled(dims, 1.0);
        for _ in 0..4 {
            submitter.submit(&p, &c).unwrap();
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }
}
