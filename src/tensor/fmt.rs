use crate::tensor::{DenseTensor, RaggedTensor};

impl std::fmt::Display for DenseTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("Tensor(")?;
        match self.to_native() {
            Ok(values) => write!(f, "{values}")?,
            // half precision values without the `half` feature
            Err(_) => write!(f, "{:?}", self.data())?,
        }
        write!(f, ", shape={}, dtype={})", self.static_shape(), self.dtype())
    }
}

impl std::fmt::Display for RaggedTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("RaggedTensor(")?;
        match self.to_native() {
            Ok(values) => write!(f, "{values}")?,
            Err(_) => {
                write!(f, "flat_values={:?}, row_partitions=[", self.flat_values().data())?;
                for (i, partition) in self.nested_row_partitions().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{partition}")?;
                }
                f.write_str("]")?;
            }
        }
        write!(f, ", shape={}, dtype={})", self.static_shape(), self.dtype())
    }
}
