use crate::alloc::format;
use crate::tensor::RowPartition;
use crate::{Error, Result};

/// A runtime consistency check attached to a structured tensor by a validating constructor.
///
/// Checks are recorded when the compared quantities are not statically known, and run by
/// [`StructuredTensor::evaluate`](super::StructuredTensor::evaluate).
#[derive(Clone, Debug)]
pub(crate) enum Check {
    /// The runtime row counts of two fields are equal.
    NrowsEqual {
        field: crate::alloc::String,
        expected: usize,
        actual: usize,
    },
    /// Two row partitions have the same row splits.
    RowSplitsEqual {
        field: crate::alloc::String,
        expected: RowPartition,
        actual: RowPartition,
    },
}
impl Check {
    pub(crate) fn run(&self) -> Result<()> {
        match self {
            Check::NrowsEqual {
                field,
                expected,
                actual,
            } => {
                if expected != actual {
                    log::error!("field {field} has {actual} rows, expected {expected}");
                    return Err(Error::CheckFailed(format!(
                        "fields have incompatible nrows: field {field} has {actual} rows, expected {expected}"
                    )));
                }
            }
            Check::RowSplitsEqual {
                field,
                expected,
                actual,
            } => {
                if !expected.is_row_compatible(actual) {
                    log::error!(
                        "field {field} has row_splits {:?}, expected {:?}",
                        actual.row_splits(),
                        expected.row_splits()
                    );
                    return Err(Error::CheckFailed(format!(
                        "incompatible row_splits: field {field} has row_splits {:?}, expected {:?}",
                        actual.row_splits(),
                        expected.row_splits()
                    )));
                }
            }
        }
        Ok(())
    }
}
