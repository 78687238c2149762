use std::path::PathBuf;

/// The outcome of one item in a batch operation
#[derive(Debug)]
pub struct BatchItem<T, E> {
    pub target: PathBuf,
    pub result: Result<T, E>,
}

/// Per-item results of a batch operation. Batches never stop at the first failure.
#[derive(Debug)]
pub struct BatchReport<T, E> {
    pub items: Vec<BatchItem<T, E>>,
}

impl<T, E> Default for BatchReport<T, E> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T, E> BatchReport<T, E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, target: PathBuf, result: Result<T, E>) {
        self.items.push(BatchItem { target, result });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = (&PathBuf, &T)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().ok().map(|v| (&item.target, v)))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&PathBuf, &E)> {
        self.items
            .iter()
            .filter_map(|item| item.result.as_ref().err().map(|e| (&item.target, e)))
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failure_count() == 0
    }
}
