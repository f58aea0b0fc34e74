//! Caller-supplied merge semantics.

/// Combines merge operands with the existing value of a key.
///
/// The store calls [`full_merge`](Self::full_merge) once per merged key while
/// executing a batch, with every operand the batch holds for that key.
/// Returning `None` aborts the whole batch with
/// [`crate::CoreError::MergeFailed`].
///
/// The store never calls [`partial_merge`](Self::partial_merge).
pub trait MergeOperator: Send + Sync {
    /// Produces the new value for `key`.
    ///
    /// `existing` is the value visible to the batch at that point, or `None`
    /// if the key is absent. `operands` are in the order they were added.
    fn full_merge(&self, key: &[u8], existing: Option<&[u8]>, operands: &[Vec<u8>])
        -> Option<Vec<u8>>;

    /// Folds two operands into one without looking at the stored value.
    ///
    /// Not used by [`crate::Store`]. It is part of the contract for engines
    /// that combine operands before they reach the store. The default
    /// declines.
    fn partial_merge(&self, _key: &[u8], _left: &[u8], _right: &[u8]) -> Option<Vec<u8>> {
        None
    }

    /// Operator name, used in log output.
    fn name(&self) -> &str;
}

/// Appends every operand to the existing value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatMergeOperator;

impl MergeOperator for ConcatMergeOperator {
    fn full_merge(
        &self,
        _key: &[u8],
        existing: Option<&[u8]>,
        operands: &[Vec<u8>],
    ) -> Option<Vec<u8>> {
        let mut value = existing.map(<[u8]>::to_vec).unwrap_or_default();
        for operand in operands {
            value.extend_from_slice(operand);
        }
        Some(value)
    }

    fn partial_merge(&self, _key: &[u8], left: &[u8], right: &[u8]) -> Option<Vec<u8>> {
        Some([left, right].concat())
    }

    fn name(&self) -> &str {
        "concat"
    }
}
