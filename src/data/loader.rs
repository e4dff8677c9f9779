//! Mini-batch iteration over a [`Dataset`].

use super::Dataset;
use crate::error::Result;
use crate::primitives::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One mini-batch.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Stacked samples, `[batch, ...sample shape]`
    pub inputs: Tensor,
    /// Labels aligned with `inputs`
    pub targets: Vec<usize>,
    /// Dataset indices of the samples
    pub indices: Vec<usize>,
}

impl Batch {
    /// Number of samples in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the batch holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Batches a dataset, optionally reshuffling every pass.
///
/// The loader owns the RNG used for shuffling and for random transforms,
/// so a seeded loader replays the same batches.
#[derive(Debug)]
pub struct DataLoader<'a, D: Dataset + ?Sized> {
    dataset: &'a D,
    batch_size: usize,
    shuffle: bool,
    rng: StdRng,
}

impl<'a, D: Dataset + ?Sized> DataLoader<'a, D> {
    /// Sequential loader; a `batch_size` of 0 is treated as 1.
    pub fn new(dataset: &'a D, batch_size: usize) -> Self {
        Self {
            dataset,
            batch_size: batch_size.max(1),
            shuffle: false,
            rng: StdRng::from_entropy(),
        }
    }

    /// Reshuffle sample order on every pass.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Seed the loader RNG.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Number of batches per pass (the last one may be short).
    #[must_use]
    pub fn len(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Whether the dataset is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dataset.len() == 0
    }

    /// Number of samples per pass.
    #[must_use]
    pub fn num_samples(&self) -> usize {
        self.dataset.len()
    }

    /// Batch size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Starts a pass over the dataset.
    pub fn batches(&mut self) -> BatchIter<'_, D> {
        let mut order: Vec<usize> = (0..self.dataset.len()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        BatchIter {
            dataset: self.dataset,
            rng: &mut self.rng,
            order,
            batch_size: self.batch_size,
            pos: 0,
        }
    }
}

/// Iterator over the batches of one pass.
pub struct BatchIter<'l, D: Dataset + ?Sized> {
    dataset: &'l D,
    rng: &'l mut StdRng,
    order: Vec<usize>,
    batch_size: usize,
    pos: usize,
}

impl<D: Dataset + ?Sized> Iterator for BatchIter<'_, D> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos >= self.order.len() {
            return None;
        }
        let end = (self.pos + self.batch_size).min(self.order.len());
        let indices = self.order[self.pos..end].to_vec();
        self.pos = end;

        let mut samples = Vec::with_capacity(indices.len());
        let mut targets = Vec::with_capacity(indices.len());
        for &i in &indices {
            match self.dataset.get(i, self.rng) {
                Ok((x, y)) => {
                    samples.push(x);
                    targets.push(y);
                }
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Tensor::stack(&samples).map(|inputs| Batch {
            inputs,
            targets,
            indices,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sample `i` is the scalar `i` with label `i % 3`.
    struct Counting(usize);

    impl Dataset for Counting {
        fn len(&self) -> usize {
            self.0
        }

        fn get(&self, index: usize, _rng: &mut StdRng) -> Result<(Tensor, usize)> {
            Ok((Tensor::new(vec![index as f32], &[1])?, index % 3))
        }
    }

    #[test]
    fn test_len_counts_partial_batch() {
        let ds = Counting(10);
        assert_eq!(DataLoader::new(&ds, 4).len(), 3);
        assert_eq!(DataLoader::new(&ds, 1).len(), 10);
        assert_eq!(DataLoader::new(&ds, 0).batch_size(), 1);
        assert!(DataLoader::new(&Counting(0), 4).is_empty());
    }

    #[test]
    fn test_sequential_order_and_shapes() {
        let ds = Counting(5);
        let mut loader = DataLoader::new(&ds, 2);
        let batches: Vec<Batch> = loader.batches().collect::<Result<_>>().expect("batches");
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].inputs.shape(), &[2, 1]);
        assert_eq!(batches[0].indices, vec![0, 1]);
        assert_eq!(batches[2].targets, vec![1]);
        assert_eq!(batches[2].len(), 1);
    }

    #[test]
    fn test_shuffle_is_a_seeded_permutation() {
        let ds = Counting(20);
        let order = |seed| {
            let mut loader = DataLoader::new(&ds, 6).with_shuffle(true).with_seed(seed);
            loader
                .batches()
                .flat_map(|b| b.expect("batch").indices)
                .collect::<Vec<_>>()
        };
        let a = order(3);
        assert_eq!(a, order(3));
        assert_ne!(a, (0..20).collect::<Vec<_>>());
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_each_pass_reshuffles() {
        let ds = Counting(30);
        let mut loader = DataLoader::new(&ds, 30).with_shuffle(true).with_seed(1);
        let first = loader.batches().next().expect("one batch").expect("ok").indices;
        let second = loader.batches().next().expect("one batch").expect("ok").indices;
        assert_ne!(first, second);
    }
}
