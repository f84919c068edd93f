//! Scoped-thread parallel iteration over slices.
//!
//! Splits work across threads with [`std::thread::scope`], falling back to
//! sequential iteration for small inputs. Used for per-entity delta
//! operators where every element is independent.

/// Configuration for parallel iteration.
///
/// Controls the number of worker threads and minimum batch size.
/// Use [`Default::default()`] for sensible defaults.
#[derive(Debug, Clone)]
pub struct ParConfig {
    /// Minimum number of elements per batch. Default: 10.
    pub min_batch_size: usize,
    /// Number of worker threads. `None` uses
    /// [`std::thread::available_parallelism`]. Default: `None`.
    pub num_threads: Option<usize>,
}

impl Default for ParConfig {
    fn default() -> Self {
        Self {
            min_batch_size: 10,
            num_threads: None,
        }
    }
}

impl ParConfig {
    /// Runs everything on the calling thread.
    pub fn sequential() -> Self {
        Self {
            min_batch_size: usize::MAX,
            num_threads: Some(1),
        }
    }

    fn effective_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Batch size for `count` elements, or `None` when sequential is cheaper.
    fn batch_size(&self, count: usize) -> Option<usize> {
        let threads = self.effective_threads().max(1);
        if threads == 1 || count <= self.min_batch_size {
            return None;
        }
        Some((count / (threads * 4)).max(self.min_batch_size).max(1))
    }
}

/// Calls `f(index, item)` for every element, in parallel batches.
pub fn par_for_each_mut<T, F>(items: &mut [T], config: &ParConfig, f: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync,
{
    let Some(batch_size) = config.batch_size(items.len()) else {
        for (i, item) in items.iter_mut().enumerate() {
            f(i, item);
        }
        return;
    };

    let f = &f;
    std::thread::scope(|scope| {
        for (ci, chunk) in items.chunks_mut(batch_size).enumerate() {
            scope.spawn(move || {
                let base = ci * batch_size;
                for (i, item) in chunk.iter_mut().enumerate() {
                    f(base + i, item);
                }
            });
        }
    });
}

/// Maps every element through `f(index, item)` in parallel batches,
/// preserving order.
pub fn par_map<T, R, F>(items: &[T], config: &ParConfig, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    let Some(batch_size) = config.batch_size(items.len()) else {
        return items.iter().enumerate().map(|(i, t)| f(i, t)).collect();
    };

    let f = &f;
    std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .chunks(batch_size)
            .enumerate()
            .map(|(ci, chunk)| {
                scope.spawn(move || {
                    let base = ci * batch_size;
                    chunk
                        .iter()
                        .enumerate()
                        .map(|(i, t)| f(base + i, t))
                        .collect::<Vec<R>>()
                })
            })
            .collect();

        let mut out = Vec::with_capacity(items.len());
        for handle in handles {
            match handle.join() {
                Ok(part) => out.extend(part),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn par_config_default() {
        let config = ParConfig::default();
        assert_eq!(config.min_batch_size, 10);
        assert!(config.num_threads.is_none());
    }

    #[test]
    fn effective_threads_respects_override() {
        let config = ParConfig {
            num_threads: Some(3),
            ..Default::default()
        };
        assert_eq!(config.effective_threads(), 3);
    }

    #[test]
    fn small_inputs_run_sequentially() {
        let config = ParConfig {
            num_threads: Some(4),
            ..Default::default()
        };
        assert_eq!(config.batch_size(10), None);
        assert_eq!(config.batch_size(1000), Some(62));
    }

    #[test]
    fn for_each_visits_every_index_once() {
        let config = ParConfig {
            num_threads: Some(4),
            min_batch_size: 3,
        };
        let mut items = vec![0usize; 100];
        par_for_each_mut(&mut items, &config, |i, v| *v += i + 1);
        for (i, v) in items.iter().enumerate() {
            assert_eq!(*v, i + 1);
        }
    }

    #[test]
    fn map_preserves_order() {
        let config = ParConfig {
            num_threads: Some(8),
            min_batch_size: 2,
        };
        let items: Vec<u32> = (0..57).collect();
        let doubled = par_map(&items, &config, |i, v| {
            assert_eq!(i as u32, *v);
            v * 2
        });
        assert_eq!(doubled, (0..57).map(|v| v * 2).collect::<Vec<u32>>());
    }
}
