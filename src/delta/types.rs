use serde::{Deserialize, Serialize};

/// One step of rebuilding the new data
///
/// Output position is implicit: each operation appends to what the previous
/// ones produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Copy the whole old-data block with this index
    Copy { block_index: u32 },
    /// Insert bytes that were not found in the old data
    Literal { data: Vec<u8> },
}

impl Operation {
    /// Check if this is a copy
    pub fn is_copy(&self) -> bool {
        matches!(self, Operation::Copy { .. })
    }

    /// Literal payload, if any
    pub fn literal(&self) -> Option<&[u8]> {
        match self {
            Operation::Literal { data } => Some(data),
            Operation::Copy { .. } => None,
        }
    }
}

/// Statistics about a delta
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaStats {
    pub copied_bytes: u64,
    pub literal_bytes: u64,
    pub copy_operations: usize,
    pub literal_operations: usize,
}

impl DeltaStats {
    /// Account for a copy of `length` bytes
    pub fn record_copy(&mut self, length: u64) {
        self.copied_bytes += length;
        self.copy_operations += 1;
    }

    /// Account for a literal of `length` bytes
    pub fn record_literal(&mut self, length: u64) {
        self.literal_bytes += length;
        self.literal_operations += 1;
    }

    /// Size of the rebuilt data
    pub fn target_size(&self) -> u64 {
        self.copied_bytes + self.literal_bytes
    }

    /// Total number of operations
    pub fn operation_count(&self) -> usize {
        self.copy_operations + self.literal_operations
    }

    /// Percentage of the target that was copied from old data
    pub fn copy_ratio(&self) -> f64 {
        let target = self.target_size();
        if target == 0 {
            return 0.0;
        }
        self.copied_bytes as f64 / target as f64 * 100.0
    }
}

impl std::fmt::Display for DeltaStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Delta: {} copied ({:.1}%), {} literal, {} total ops",
            self.copied_bytes,
            self.copy_ratio(),
            self.literal_bytes,
            self.operation_count()
        )
    }
}
