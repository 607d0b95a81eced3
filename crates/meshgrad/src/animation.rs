//! Per-point animation state on the producer side.
//!
//! Values here are what the caller sees; [`AnimationState::snapshot`] flattens
//! them into the arrays [`crate::sync::Submitter::submit`] expects.

use std::time::Instant;

use crate::timeline::Timing;
use crate::types::{ControlGrid, GridDims, MeshError, COLOR_COMPONENTS, POSITION_COMPONENTS};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointAnimation {
    from: [f32; 2],
    target: [f32; 2],
    timing: Timing,
    start: Instant,
}

impl PointAnimation {
    pub fn target(&self) -> [f32; 2] {
        self.target
    }

    /// Position at `now` and whether the animation has reached its target.
    fn sample(&self, now: Instant) -> ([f32; 2], bool) {
        let (mix, finished) = self
            .timing
            .progress(now.saturating_duration_since(self.start));
        if finished {
            return (self.target, true);
        }
        let lerp = |a: f32, b: f32| a + (b - a) * mix;
        (
            [
                lerp(self.from[0], self.target[0]),
                lerp(self.from[1], self.target[1]),
            ],
            false,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AnimatableControlPoint {
    value: [f32; 2],
    animation: Option<PointAnimation>,
}

pub struct AnimationState {
    dims: GridDims,
    points: Vec<AnimatableControlPoint>,
    colors: Vec<[f32; 4]>,
    position_buf: Vec<f32>,
    color_buf: Vec<f32>,
    dirty: bool,
}

impl AnimationState {
    pub fn new(grid: &ControlGrid) -> Self {
        let dims = grid.dims();
        let points = (0..dims.point_count())
            .map(|i| AnimatableControlPoint {
                value: grid.position(i),
                animation: None,
            })
            .collect();
        let colors = (0..dims.point_count()).map(|i| grid.color(i)).collect();
        Self {
            dims,
            points,
            colors,
            position_buf: Vec::with_capacity(dims.position_len()),
            color_buf: Vec::with_capacity(dims.color_len()),
            dirty: true,
        }
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    fn check_index(&self, index: usize) -> Result<(), MeshError> {
        if index >= self.points.len() {
            return Err(MeshError::IndexOutOfRange {
                index,
                len: self.points.len(),
            });
        }
        Ok(())
    }

    /// Starts moving point `index` from its current value toward `target`,
    /// replacing any animation already running on it.
    pub fn animate_to(
        &mut self,
        index: usize,
        target: [f32; 2],
        timing: Timing,
        now: Instant,
    ) -> Result<(), MeshError> {
        self.check_index(index)?;
        let point = &mut self.points[index];
        point.animation = Some(PointAnimation {
            from: point.value,
            target,
            timing,
            start: now,
        });
        Ok(())
    }

    /// Moves point `index` immediately and cancels its animation.
    pub fn snap_to(&mut self, index: usize, value: [f32; 2]) -> Result<(), MeshError> {
        self.check_index(index)?;
        self.points[index] = AnimatableControlPoint {
            value,
            animation: None,
        };
        self.dirty = true;
        Ok(())
    }

    /// Assigns `values[i]` to point `i` for every supplied value. Supplying
    /// fewer values than points leaves the rest untouched.
    pub fn snap_all_points(&mut self, values: &[[f32; 2]]) -> Result<(), MeshError> {
        if values.len() > self.points.len() {
            return Err(MeshError::LengthMismatch {
                what: "points",
                expected: self.points.len(),
                actual: values.len(),
            });
        }
        for (point, &value) in self.points.iter_mut().zip(values) {
            point.value = value;
            point.animation = None;
        }
        self.dirty = true;
        Ok(())
    }

    pub fn set_color(&mut self, index: usize, color: [f32; 4]) -> Result<(), MeshError> {
        self.check_index(index)?;
        self.colors[index] = color;
        self.dirty = true;
        Ok(())
    }

    /// Advances every running animation to `now`. Returns whether any point
    /// moved; finished animations land exactly on their target.
    pub fn tick(&mut self, now: Instant) -> bool {
        let mut moved = false;
        for point in &mut self.points {
            let Some(animation) = point.animation else {
                continue;
            };
            let (value, finished) = animation.sample(now);
            if value != point.value {
                point.value = value;
                moved = true;
            }
            if finished {
                point.animation = None;
            }
        }
        self.dirty |= moved;
        moved
    }

    pub fn position(&self, index: usize) -> Result<[f32; 2], MeshError> {
        self.check_index(index)?;
        Ok(self.points[index].value)
    }

    pub fn color(&self, index: usize) -> Result<[f32; 4], MeshError> {
        self.check_index(index)?;
        Ok(self.colors[index])
    }

    pub fn animation(&self, index: usize) -> Option<&PointAnimation> {
        self.points.get(index)?.animation.as_ref()
    }

    pub fn is_animating(&self, index: usize) -> bool {
        self.animation(index).is_some()
    }

    pub fn any_animating(&self) -> bool {
        self.points.iter().any(|p| p.animation.is_some())
    }

    /// Whether values changed since the last [`AnimationState::snapshot`].
    pub fn has_changes(&self) -> bool {
        self.dirty
    }

    pub fn positions_array(&mut self) -> &[f32] {
        self.position_buf.clear();
        self.position_buf
            .extend(self.points.iter().flat_map(|p| p.value));
        debug_assert_eq!(self.position_buf.len(), self.points.len() * POSITION_COMPONENTS);
        &self.position_buf
    }

    pub fn colors_array(&mut self) -> &[f32] {
        self.color_buf.clear();
        self.color_buf.extend(self.colors.iter().flatten());
        debug_assert_eq!(self.color_buf.len(), self.colors.len() * COLOR_COMPONENTS);
        &self.color_buf
    }

    /// Refills both flat buffers and clears the change flag.
    pub fn snapshot(&mut self) -> (&[f32], &[f32]) {
        self.positions_array();
        self.colors_array();
        self.dirty = false;
        (&self.position_buf, &self.color_buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::TimingCurve;
    use std::time::Duration;

    fn state() -> AnimationState {
        AnimationState::new(&ControlGrid::lattice(GridDims::new(3, 3).unwrap()))
    }

    fn linear(ms: u64) -> Timing {
        Timing::new(Duration::from_millis(ms), TimingCurve::Linear)
    }

    #[test]
    fn starts_from_the_grid() {
        let mut state = state();
        assert_eq!(state.position(4).unwrap(), [0.5, 0.5]);
        assert_eq!(state.color(8).unwrap(), [1.0; 4]);
        let (positions, colors) = state.snapshot();
        assert_eq!(positions.len(), 18);
        assert_eq!(colors.len(), 36);
        assert!(!state.has_changes());
    }

    #[test]
    fn animation_lands_exactly_on_target() {
        let mut state = state();
        let start = Instant::now();
        state.animate_to(4, [0.8, 0.2], linear(100), start).unwrap();
        assert!(state.is_animating(4));

        assert!(state.tick(start + Duration::from_millis(50)));
        let [x, y] = state.position(4).unwrap();
        assert!((x - 0.65).abs() < 1e-3 && (y - 0.35).abs() < 1e-3);

        state.tick(start + Duration::from_millis(250));
        assert_eq!(state.position(4).unwrap(), [0.8, 0.2]);
        assert!(!state.is_animating(4));
        assert!(!state.tick(start + Duration::from_millis(300)));
    }

    #[test]
    fn later_call_replaces_running_animation() {
        let mut state = state();
        let start = Instant::now();
        state.animate_to(4, [1.0, 1.0], linear(100), start).unwrap();
        state.tick(start + Duration::from_millis(50));
        let midway = state.position(4).unwrap();

        let restart = start + Duration::from_millis(50);
        state.animate_to(4, [0.0, 0.0], linear(100), restart).unwrap();
        assert_eq!(state.animation(4).unwrap().target(), [0.0, 0.0]);
        state.tick(restart);
        assert_eq!(state.position(4).unwrap(), midway);
        state.tick(restart + Duration::from_millis(100));
        assert_eq!(state.position(4).unwrap(), [0.0, 0.0]);
    }

    #[test]
    fn zero_duration_snaps_on_next_tick() {
        let mut state = state();
        let now = Instant::now();
        state.animate_to(0, [0.1, 0.1], linear(0), now).unwrap();
        assert!(state.tick(now));
        assert_eq!(state.position(0).unwrap(), [0.1, 0.1]);
        assert!(!state.any_animating());
    }

    #[test]
    fn snap_cancels_animation() {
        let mut state = state();
        let now = Instant::now();
        state.animate_to(2, [0.0, 0.0], linear(100), now).unwrap();
        state.snap_to(2, [0.3, 0.3]).unwrap();
        assert!(!state.is_animating(2));
        state.tick(now + Duration::from_millis(200));
        assert_eq!(state.position(2).unwrap(), [0.3, 0.3]);
    }

    #[test]
    fn snap_all_points_applies_every_supplied_value() {
        let mut state = state();
        let now = Instant::now();
        for i in 0..9 {
            state.animate_to(i, [0.0, 0.0], linear(100), now).unwrap();
        }
        let values: Vec<[f32; 2]> = (0..9).map(|i| [i as f32 * 0.1, 0.25]).collect();
        state.snap_all_points(&values).unwrap();
        for (i, value) in values.iter().enumerate() {
            assert_eq!(state.position(i).unwrap(), *value);
            assert!(!state.is_animating(i));
        }
        let (positions, _) = state.snapshot();
        assert_eq!(positions[2], 0.1);
        assert_eq!(positions[3], 0.25);
    }

    #[test]
    fn snap_all_points_prefix_and_overflow() {
        let mut state = state();
        state.snap_all_points(&[[0.9, 0.9], [0.8, 0.8]]).unwrap();
        assert_eq!(state.position(1).unwrap(), [0.8, 0.8]);
        assert_eq!(state.position(2).unwrap(), [1.0, 0.0]);

        let before = state.position(0).unwrap();
        let too_many = vec![[0.0, 0.0]; 10];
        assert!(matches!(
            state.snap_all_points(&too_many),
            Err(MeshError::LengthMismatch { expected: 9, actual: 10, .. })
        ));
        assert_eq!(state.position(0).unwrap(), before);
    }

    #[test]
    fn out_of_range_indices_are_rejected() {
        let mut state = state();
        let err = MeshError::IndexOutOfRange { index: 9, len: 9 };
        assert_eq!(state.snap_to(9, [0.0, 0.0]), Err(err.clone()));
        assert_eq!(state.set_color(9, [0.0; 4]), Err(err.clone()));
        assert_eq!(
            state.animate_to(9, [0.0, 0.0], Timing::default(), Instant::now()),
            Err(err.clone())
        );
        assert_eq!(state.position(9), Err(err));
    }

    #[test]
    fn set_color_marks_changes() {
        let mut state = state();
        state.snapshot();
        state.set_color(3, [0.2, 0.4, 0.6, 0.8]).unwrap();
        assert!(state.has_changes());
        let (_, colors) = state.snapshot();
        assert_eq!(&colors[12..16], &[0.2, 0.4, 0.6, 0.8]);
    }
}
