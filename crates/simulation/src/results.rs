use std::{collections::TryReserveError, ops::Range};

/// One recorded output point.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub time: f64,
    pub states: Box<[f64]>,
    pub rates: Box<[f64]>,
    pub computed: Box<[f64]>,
}

/// A variable that can be read out of a [`Point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    State(usize),
    Rate(usize),
    Computed(usize),
}

impl Point {
    /// Returns the value of `variable`, or `None` if the index is out of range.
    #[must_use]
    pub fn value(&self, variable: Variable) -> Option<f64> {
        match variable {
            Variable::State(index) => self.states.get(index),
            Variable::Rate(index) => self.rates.get(index),
            Variable::Computed(index) => self.computed.get(index),
        }
        .copied()
    }
}

/// The points recorded by a run, in increasing time order.
///
/// Only the worker appends, and only [`Simulation::reset`] clears.
///
/// [`Simulation::reset`]: crate::Simulation::reset
#[derive(Debug, Clone, Default)]
pub struct ResultsBuffer {
    points: Vec<Point>,
}

impl ResultsBuffer {
    /// Creates an empty buffer with room for `capacity` points.
    ///
    /// Fails instead of aborting when the points cannot be allocated.
    pub(crate) fn try_with_capacity(capacity: usize) -> Result<Self, TryReserveError> {
        let mut points = Vec::new();
        points.try_reserve_exact(capacity)?;
        Ok(Self { points })
    }

    pub(crate) fn push(&mut self, point: Point) {
        debug_assert!(self.points.last().is_none_or(|last| last.time <= point.time));
        self.points.push(point);
    }

    pub(crate) fn clear(&mut self) {
        self.points.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Point> {
        self.points.get(index)
    }

    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.points.last()
    }

    /// Returns the points recorded at or after `index`.
    ///
    /// Lets a consumer that has already seen `index` points read only the new
    /// ones.
    #[must_use]
    pub fn since(&self, index: usize) -> &[Point] {
        self.points.get(index..).unwrap_or_default()
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|point| point.time)
    }

    /// Returns the values of `variable` at every recorded point.
    ///
    /// Points where the index is out of range are skipped.
    pub fn series(&self, variable: Variable) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(move |point| point.value(variable))
    }

    /// Linearly interpolates `variable` at `time`.
    ///
    /// Returns `None` if `time` is outside the recorded range or the index is
    /// out of range.
    #[must_use]
    pub fn value_at(&self, time: f64, variable: Variable) -> Option<f64> {
        let Range { start, end } = self.bracket(time)?;
        let (left, right) = (&self.points[start], &self.points[end]);
        let (a, b) = (left.value(variable)?, right.value(variable)?);

        if right.time == left.time {
            return Some(b);
        }
        let weight = (time - left.time) / (right.time - left.time);
        Some(a + weight * (b - a))
    }

    /// Indices of the two points around `time`.
    fn bracket(&self, time: f64) -> Option<Range<usize>> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        if !(first.time..=last.time).contains(&time) {
            return None;
        }

        let end = self
            .points
            .partition_point(|point| point.time < time)
            .max(1)
            .min(self.points.len() - 1);
        Some(end.saturating_sub(1)..end)
    }
}
