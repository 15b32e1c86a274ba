//! Rolling memories of per-cell quantities
//!
//! A [`RollingWindow`] keeps the last `capacity` snapshots of a `[lat, lon, group]`
//! field in a fixed-capacity circular buffer. Pushing into a full window evicts the
//! oldest snapshot; storage is allocated once up front.
//!
//! Windows can be exported for a restart and rebuilt from the export. The export stores
//! NaN (land) as zero; the rebuilt window puts NaN back over land cells.

use crate::errors::{check_shape, BoatsResult};
use ndarray::{Array2, Array3, Array4, ArrayView3, ArrayView4, Axis, Zip};

#[derive(Debug, Clone)]
pub struct RollingWindow {
    /// Slots of shape `[capacity, lat, lon, group]`.
    data: Array4<f64>,
    /// Slot the next push writes to.
    cursor: usize,
    len: usize,
}

impl RollingWindow {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize, shape: (usize, usize, usize)) -> Self {
        assert!(capacity > 0, "RollingWindow needs a non-zero capacity");
        Self {
            data: Array4::zeros((capacity, shape.0, shape.1, shape.2)),
            cursor: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a snapshot, evicting the oldest one when full.
    ///
    /// # Panics
    ///
    /// Panics if the snapshot shape differs from the window's field shape.
    pub fn push(&mut self, field: ArrayView3<f64>) {
        let capacity = self.capacity();
        self.data
            .index_axis_mut(Axis(0), self.cursor)
            .assign(&field);
        self.cursor = (self.cursor + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
    }

    fn slot(&self, index: usize) -> usize {
        let capacity = self.capacity();
        (self.cursor + capacity - self.len + index) % capacity
    }

    /// Snapshots from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = ArrayView3<'_, f64>> + '_ {
        (0..self.len).map(move |i| self.data.index_axis(Axis(0), self.slot(i)))
    }

    /// Elementwise sum of the most recent `n` snapshots (fewer if not yet available).
    pub fn sum_last(&self, n: usize) -> Array3<f64> {
        let shape = self.field_shape();
        let mut total = Array3::zeros(shape);
        let n = n.min(self.len);
        for snapshot in self.iter().skip(self.len - n) {
            total += &snapshot;
        }
        total
    }

    /// Elementwise mean of all retained snapshots, zero when empty.
    pub fn mean(&self) -> Array3<f64> {
        let mut total = self.sum_last(self.len);
        if self.len > 0 {
            total /= self.len as f64;
        }
        total
    }

    /// Chronological values of one cell/group.
    pub fn cell_series(&self, lat: usize, lon: usize, group: usize) -> Vec<f64> {
        self.iter().map(|field| field[[lat, lon, group]]).collect()
    }

    pub fn field_shape(&self) -> (usize, usize, usize) {
        let (_, a, b, c) = self.data.dim();
        (a, b, c)
    }

    /// Chronological copy of the retained snapshots, `[len, lat, lon, group]`.
    pub fn to_array(&self) -> Array4<f64> {
        let (a, b, c) = self.field_shape();
        let mut out = Array4::zeros((self.len, a, b, c));
        for (mut dst, snapshot) in out.outer_iter_mut().zip(self.iter()) {
            dst.assign(&snapshot);
        }
        out
    }

    /// Rebuild a window from chronological snapshots `[len, lat, lon, group]`, keeping
    /// the most recent `capacity`.
    pub fn from_history(capacity: usize, history: ArrayView4<f64>) -> Self {
        let (_, n_lat, n_lon, n_groups) = history.dim();
        let mut window = Self::new(capacity, (n_lat, n_lon, n_groups));
        for snapshot in history.outer_iter() {
            window.push(snapshot);
        }
        window
    }

    /// Chronological copy with NaN stored as zero.
    pub fn to_restart(&self) -> Array4<f64> {
        self.to_array().mapv(|v| if v.is_nan() { 0.0 } else { v })
    }

    /// Rebuild a window exported with [`RollingWindow::to_restart`].
    ///
    /// `history` must hold snapshots of `shape`. With an ocean mask, entries over land
    /// are NaN again.
    pub fn from_restart(
        name: &str,
        capacity: usize,
        shape: (usize, usize, usize),
        history: &Array4<f64>,
        ocean: Option<&Array2<bool>>,
    ) -> BoatsResult<Self> {
        check_shape(name, &[shape.0, shape.1, shape.2], &history.shape()[1..])?;
        let mut history = history.clone();
        if let Some(ocean) = ocean {
            check_shape(name, ocean.shape(), &history.shape()[1..3])?;
            Zip::indexed(&mut history).for_each(|(_, i, j, _), v| {
                if !ocean[[i, j]] {
                    *v = f64::NAN;
                }
            });
        }
        Ok(Self::from_history(capacity, history.view()))
    }

    /// Elementwise mean of the most recent `n` snapshots.
    pub fn mean_last(&self, n: usize) -> Array3<f64> {
        let n = n.min(self.len);
        let mut total = self.sum_last(n);
        if n > 0 {
            total /= n as f64;
        }
        total
    }

    #[cfg(test)]
    fn raw_slots(&self) -> ndarray::ArrayView4<'_, f64> {
        self.data.view()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(value: f64) -> Array3<f64> {
        Array3::from_elem((1, 1, 1), value)
    }

    fn push_values(window: &mut RollingWindow, values: impl IntoIterator<Item = f64>) {
        for v in values {
            window.push(scalar(v).view());
        }
    }

    #[test]
    fn test_grows_until_full() {
        let mut window = RollingWindow::new(12, (1, 1, 1));
        push_values(&mut window, (1..=5).map(f64::from));
        assert_eq!(window.len(), 5);
        assert_eq!(window.cell_series(0, 0, 0), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_fifo_eviction_after_thirteen_pushes() {
        let mut window = RollingWindow::new(12, (1, 1, 1));
        push_values(&mut window, (1..=13).map(f64::from));

        assert_eq!(window.len(), 12);
        assert_eq!(window.capacity(), 12);
        let series = window.cell_series(0, 0, 0);
        assert!(!series.contains(&1.0));
        assert_eq!(series, (2..=13).map(f64::from).collect::<Vec<_>>());
        // Storage never grows past capacity
        assert_eq!(window.raw_slots().len_of(Axis(0)), 12);
    }

    #[test]
    fn test_sum_and_mean() {
        let mut window = RollingWindow::new(4, (1, 1, 1));
        push_values(&mut window, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(window.sum_last(2)[[0, 0, 0]], 11.0);
        assert_eq!(window.sum_last(10)[[0, 0, 0]], 18.0);
        assert_eq!(window.mean()[[0, 0, 0]], 4.5);
        assert_eq!(window.mean_last(3)[[0, 0, 0]], 5.0);
    }

    #[test]
    fn test_empty_window() {
        let window = RollingWindow::new(3, (2, 2, 1));
        assert!(window.is_empty());
        assert_eq!(window.mean(), Array3::<f64>::zeros((2, 2, 1)));
    }

    #[test]
    fn test_to_array_is_chronological() {
        let history = Array4::from_shape_fn((5, 1, 1, 1), |(t, _, _, _)| t as f64);
        let window = RollingWindow::from_history(3, history.view());
        let stacked = window.to_array();
        assert_eq!(stacked.len_of(Axis(0)), 3);
        assert_eq!(stacked[[0, 0, 0, 0]], 2.0);
        assert_eq!(stacked[[2, 0, 0, 0]], 4.0);
    }

    #[test]
    fn test_restart_round_trip_masks_land() {
        let ocean = ndarray::array![[true, false]];
        let mut window = RollingWindow::new(12, (1, 2, 1));
        for v in 1..=14 {
            let mut field = Array3::from_elem((1, 2, 1), f64::from(v));
            field[[0, 1, 0]] = f64::NAN;
            window.push(field.view());
        }
        let exported = window.to_restart();
        assert!(exported.iter().all(|v| v.is_finite()));

        let restored =
            RollingWindow::from_restart("window", 12, (1, 2, 1), &exported, Some(&ocean)).unwrap();
        assert_eq!(restored.len(), 12);
        assert_eq!(restored.cell_series(0, 0, 0), window.cell_series(0, 0, 0));
        assert!(restored.cell_series(0, 1, 0).iter().all(|v| v.is_nan()));
        assert_eq!(restored.mean()[[0, 0, 0]], window.mean()[[0, 0, 0]]);
    }

    #[test]
    fn test_restart_shape_checked() {
        let exported = Array4::zeros((3, 2, 2, 1));
        assert!(RollingWindow::from_restart("window", 12, (2, 2, 2), &exported, None).is_err());
    }
}
