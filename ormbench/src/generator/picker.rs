use ormbench_core::Operation;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Relative frequency of each operation in a virtual client's session.
pub const OPERATION_WEIGHTS: [(Operation, u32); 7] = [
    (Operation::CreateUser, 3),
    (Operation::ListUsers, 5),
    (Operation::GetUser, 4),
    (Operation::CreatePost, 2),
    (Operation::ListPosts, 4),
    (Operation::GetUserPosts, 3),
    (Operation::Benchmark, 1),
];

/// Discrete distribution over [`OPERATION_WEIGHTS`].
#[derive(Clone, Debug)]
pub struct OperationPicker {
    index: WeightedIndex<u32>,
}

impl Default for OperationPicker {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationPicker {
    pub fn new() -> Self {
        let index = WeightedIndex::new(OPERATION_WEIGHTS.iter().map(|(_, weight)| *weight))
            .expect("Operation weight table is non-empty with positive weights");
        Self { index }
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Operation {
        OPERATION_WEIGHTS[self.index.sample(rng)].0
    }
}
