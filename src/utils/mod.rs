use num_traits::Float;

/// Axis along which a matrix operation is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ROW,
    COLUMN,
}

pub trait Normalize<T: Float> {
    /// Scales every row (or column) so that it sums to `target`, given its current sum.
    fn normalize(&mut self, sums: &[T], target: T, direction: &Direction) -> anyhow::Result<()>;
}

/// Returns the index of the largest value, the first one on ties.
pub(crate) fn argmax<'a, I>(values: I) -> Option<usize>
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (idx, &val) in values.into_iter().enumerate() {
        match best {
            Some((_, current)) if val <= current => {}
            _ => best = Some((idx, val)),
        }
    }
    best.map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax() {
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), Some(1));
        assert_eq!(argmax(&[0.5, 0.5]), Some(0));
        assert_eq!(argmax(&[] as &[f64]), None);
    }
}
