#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("adjacency matrix is empty")]
    EmptyMatrix,
    #[error("adjacency matrix row {row} has {len} columns, expected {expected}")]
    NonSquareMatrix {
        row: usize,
        len: usize,
        expected: usize,
    },
    #[error("adjacency matrix has {matrix} rows but {nodes} nodes were given")]
    DimensionMismatch { matrix: usize, nodes: usize },
    #[error("duplicate node id in matrix node data: {id}")]
    DuplicateNode { id: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;
