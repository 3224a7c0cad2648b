use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPage<T> {
    pub items: Vec<T>,
    /// The page came back short, so nothing follows it.
    pub results_exhausted: bool,
}

/// Cuts one page out of fully aggregated results.
///
/// A full last page reports `results_exhausted = false`; only the following
/// (short or empty) page reports `true`.
pub fn paginate<T>(items: Vec<T>, skip: usize, limit: usize) -> ResultPage<T> {
    let items: Vec<T> = items.into_iter().skip(skip).take(limit).collect();
    ResultPage {
        results_exhausted: items.len() < limit,
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhaustion_law() {
        let items: Vec<u32> = (0..4).collect();

        let first = paginate(items.clone(), 0, 2);
        assert_eq!(first.items, vec![0, 1]);
        assert!(!first.results_exhausted);

        // full last page is not exhausted yet
        let second = paginate(items.clone(), 2, 2);
        assert_eq!(second.items, vec![2, 3]);
        assert!(!second.results_exhausted);

        let third = paginate(items.clone(), 4, 2);
        assert!(third.items.is_empty());
        assert!(third.results_exhausted);

        let short = paginate(items, 3, 2);
        assert_eq!(short.items, vec![3]);
        assert!(short.results_exhausted);
    }
}
