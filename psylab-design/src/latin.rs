use crate::DesignError;

/// Condition id used for rest / fixation periods in para designs
pub const REST: u32 = 0;

/// Balanced Latin square of size `n` (Williams design). Row `r` is the
/// condition order for participant or block `r`; conditions are `1..=n`.
///
/// Every condition appears once per row and once per column, and every
/// ordered pair of neighbouring conditions appears exactly once across rows.
/// There is no general construction of this kind for odd `n`.
pub fn latin_square(n: usize) -> Result<Vec<Vec<u32>>, DesignError> {
    if n == 0 {
        tracing::warn!("empty Latin square requested");
        return Err(DesignError::EmptyDesign);
    }
    if n % 2 != 0 {
        tracing::warn!(n, "balanced Latin squares need an even size");
        return Err(DesignError::OddLatinSquare(n));
    }

    let first_line: Vec<usize> = (0..n)
        .map(|i| {
            if i % 2 == 0 {
                (n - i / 2) % n + 1
            } else {
                (i + 1) / 2 + 1
            }
        })
        .collect();

    let square = (0..n)
        .map(|r| {
            first_line
                .iter()
                .map(|&f| ((r + 1 + n - f) % n + 1) as u32)
                .collect()
        })
        .collect();
    tracing::debug!(n, "Latin square built");
    Ok(square)
}

/// Symmetric block design with roughly 25% rest: every Latin square row is
/// mirrored, then a `REST` marker goes before every 4th element and at the
/// end. Each row has `2n + n/2 + 1` entries.
pub fn make_para(n: usize) -> Result<Vec<Vec<u32>>, DesignError> {
    let square = latin_square(n)?;
    let para = square
        .into_iter()
        .map(|row| {
            let mirrored: Vec<u32> = row.iter().chain(row.iter().rev()).copied().collect();
            let mut out = Vec::with_capacity(2 * n + n / 2 + 1);
            for (i, cond) in mirrored.into_iter().enumerate() {
                if i % 4 == 0 {
                    out.push(REST);
                }
                out.push(cond);
            }
            out.push(REST);
            out
        })
        .collect();
    tracing::debug!(n, row_len = 2 * n + n / 2 + 1, "para design built");
    Ok(para)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn is_permutation(values: &[u32], n: usize) -> bool {
        let set: HashSet<u32> = values.iter().copied().collect();
        values.len() == n && set.len() == n && (1..=n as u32).all(|v| set.contains(&v))
    }

    #[test]
    fn four_by_four_matches_reference() {
        let square = latin_square(4).unwrap();
        assert_eq!(
            square,
            vec![
                vec![1, 4, 2, 3],
                vec![2, 1, 3, 4],
                vec![3, 2, 4, 1],
                vec![4, 3, 1, 2],
            ]
        );
    }

    #[test]
    fn odd_and_zero_sizes_are_rejected() {
        assert_eq!(latin_square(5), Err(DesignError::OddLatinSquare(5)));
        assert_eq!(latin_square(0), Err(DesignError::EmptyDesign));
        assert_eq!(make_para(3), Err(DesignError::OddLatinSquare(3)));
    }

    #[test]
    fn para_rows_are_mirrored_with_rest_markers() {
        let para = make_para(6).unwrap();
        let square = latin_square(6).unwrap();
        assert_eq!(para.len(), 6);
        for (row, latin) in para.iter().zip(&square) {
            assert_eq!(row.len(), 2 * 6 + 6 / 2 + 1);
            assert_eq!(*row.last().unwrap(), REST);
            // markers sit before every 4th condition: indices 0, 5, 10 and the end
            for idx in [0, 5, 10, 15] {
                assert_eq!(row[idx], REST, "row {row:?}");
            }
            let conditions: Vec<u32> = row.iter().copied().filter(|&c| c != REST).collect();
            let mut expected = latin.clone();
            expected.extend(latin.iter().rev());
            assert_eq!(conditions, expected);
        }
    }

    proptest! {
        #[test]
        fn rows_and_columns_are_permutations(half in 1usize..=10) {
            let n = half * 2;
            let square = latin_square(n).unwrap();
            prop_assert_eq!(square.len(), n);
            for row in &square {
                prop_assert!(is_permutation(row, n));
            }
            for c in 0..n {
                let col: Vec<u32> = square.iter().map(|row| row[c]).collect();
                prop_assert!(is_permutation(&col, n));
            }
        }

        #[test]
        fn neighbouring_pairs_are_balanced(half in 1usize..=10) {
            let n = half * 2;
            let square = latin_square(n).unwrap();
            let pairs: HashSet<(u32, u32)> = square
                .iter()
                .flat_map(|row| row.windows(2).map(|w| (w[0], w[1])))
                .collect();
            prop_assert_eq!(pairs.len(), n * (n - 1));
        }

        #[test]
        fn odd_sizes_always_fail(half in 0usize..=10) {
            let n = half * 2 + 1;
            prop_assert_eq!(latin_square(n), Err(DesignError::OddLatinSquare(n)));
        }

        #[test]
        fn para_length_formula(half in 1usize..=10) {
            let n = half * 2;
            for row in make_para(n).unwrap() {
                prop_assert_eq!(row.len(), 2 * n + n / 2 + 1);
                prop_assert_eq!(row.iter().filter(|&&c| c == REST).count(), n / 2 + 1);
            }
        }
    }
}
