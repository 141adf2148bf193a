pub mod ast;
pub mod compiler;
pub mod edit;
pub mod result;
pub mod scan;
pub mod seed;
pub mod source;
pub mod walker;

pub use ast::{AstNode, NodeId, NodeKind, SourceAst, SrcRange};
pub use compiler::{AstProvider, SolcCompiler};
pub use edit::{EditOp, EditSet};
pub use result::{Error, Result};
pub use source::SourceBuffer;

/// Reads a source file into a buffer.
pub fn read_source(path: impl AsRef<std::path::Path>) -> Result<SourceBuffer> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .map(SourceBuffer::new)
        .map_err(|source| Error::FileRead {
            path: path.display().to_string(),
            source,
        })
}
