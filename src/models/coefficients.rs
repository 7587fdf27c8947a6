use serde::{Deserialize, Serialize};

/// A fixed-length run of regression coefficients addressed from a
/// configurable first index, so equations written as `a1..a4` can index
/// their coefficients the way they are published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub values: Vec<f32>,
    #[serde(default)]
    pub index_from: i32,
}

impl Coefficients {
    pub fn new(values: Vec<f32>, index_from: i32) -> Self {
        Self { values, index_from }
    }

    /// `size` zeros addressed from `index_from`.
    pub fn empty(size: usize, index_from: i32) -> Self {
        Self::new(vec![0.0; size], index_from)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn offset(&self, index: i32) -> Option<usize> {
        let position = index - self.index_from;
        if position < 0 {
            return None;
        }
        let position = position as usize;
        (position < self.values.len()).then_some(position)
    }

    /// Coefficient at `index`, or 0 when the index is outside the stored range.
    pub fn coe(&self, index: i32) -> f32 {
        self.offset(index).map(|i| self.values[i]).unwrap_or(0.0)
    }

    pub fn set_coe(&mut self, index: i32, value: f32) {
        if let Some(i) = self.offset(index) {
            self.values[i] = value;
        }
    }

    /// The same values addressed from a different first index.
    pub fn reindex(&self, index_from: i32) -> Self {
        Self::new(self.values.clone(), index_from)
    }
}
