use std::cmp::Ordering;

/// Returns the first index whose element compares strictly greater than `target`,
/// or `None` when every element is less than or equal to it.
///
/// `arr` must be sorted ascending with respect to `comparator`.
pub fn upper_bound<T, K, F>(arr: &[T], target: &K, comparator: F) -> Option<usize>
where
    F: Fn(&K, &T) -> Ordering,
{
    let mut left = 0;
    let mut right = arr.len();

    while left < right {
        let mid = left + (right - left) / 2;

        match comparator(target, &arr[mid]) {
            Ordering::Less => right = mid,
            Ordering::Equal | Ordering::Greater => left = mid + 1,
        }
    }

    if left < arr.len() {
        Some(left)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upper_bound_with_comparator() {
        let arr = vec![2, 5, 7, 7, 7, 12];
        let ascending_comparator = |a: &i32, b: &i32| a.cmp(b);

        assert_eq!(upper_bound(&arr, &1, ascending_comparator), Some(0));
        assert_eq!(upper_bound(&arr, &2, ascending_comparator), Some(1));
        assert_eq!(upper_bound(&arr, &6, ascending_comparator), Some(2));

        // equal runs resolve past the last equal element
        assert_eq!(upper_bound(&arr, &7, ascending_comparator), Some(5));
        assert_eq!(upper_bound(&arr, &12, ascending_comparator), None);
        assert_eq!(upper_bound(&arr, &40, ascending_comparator), None);

        let empty_arr: Vec<i32> = vec![];
        assert_eq!(upper_bound(&empty_arr, &5, ascending_comparator), None);
    }

    #[test]
    fn test_upper_bound_agrees_with_linear_scan() {
        let cumulative: Vec<u64> = vec![0, 0, 3, 3, 9, 10, 10, 25];

        for target in [0.0, 0.5, 2.9999, 3.0, 3.5, 9.0, 9.999, 10.0, 24.5] {
            let linear = cumulative.iter().position(|c| (*c as f64) > target);
            let binary = upper_bound(&cumulative, &target, |n: &f64, c: &u64| {
                n.partial_cmp(&(*c as f64)).unwrap_or(Ordering::Greater)
            });

            assert_eq!(binary, linear, "target {}", target);
        }
    }
}
