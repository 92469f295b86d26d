use std::collections::VecDeque;

/// A first-in first-out queue with an optional capacity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Fifo<T> {
    inner: VecDeque<T>,
    max_size: Option<usize>,
}

impl<T> std::iter::IntoIterator for Fifo<T> {
    type Item = T;
    type IntoIter = std::collections::vec_deque::IntoIter<Self::Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<T> std::fmt::Display for Fifo<T>
where
    T: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Fifo({:>2}/{:<2}){:#?}",
            self.inner.len(),
            self.max_size
                .map(|max| max.to_string())
                .as_deref()
                .unwrap_or(""),
            self.inner
                .iter()
                .map(std::string::ToString::to_string)
                .collect::<Vec<_>>()
        )
    }
}

impl<T> Default for Fifo<T> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<T> Fifo<T> {
    #[must_use]
    pub fn new(max_size: Option<usize>) -> Self {
        Self {
            inner: VecDeque::new(),
            max_size,
        }
    }

    #[must_use]
    pub fn iter(&self) -> std::collections::vec_deque::Iter<T> {
        self.inner.iter()
    }

    pub fn enqueue(&mut self, value: T) {
        self.inner.push_back(value);
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.inner.pop_front()
    }

    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.inner.front()
    }

    #[must_use]
    pub fn full(&self) -> bool {
        match self.max_size {
            Some(max) => self.inner.len() >= max,
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn can_fit(&self, n: usize) -> bool {
        match self.max_size {
            Some(max) => self.inner.len() + n <= max,
            None => true,
        }
    }

    /// Removes and returns all leading entries matching `pred`.
    pub fn drain_while(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let mut drained = Vec::new();
        while self.inner.front().is_some_and(&mut pred) {
            drained.extend(self.inner.pop_front());
        }
        drained
    }
}
