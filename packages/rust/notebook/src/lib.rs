//! Notebook document model and `.ipynb` persistence.
//!
//! Parses the Jupyter JSON format into an ordered [`Document`] of [`Block`]s,
//! and writes it back without disturbing anything the engine did not reorder.

mod codec;
mod model;

pub use codec::{
    LoadedDocument, find_notebooks, fingerprint, load, parse_document, save, to_bytes,
    write_atomic,
};
pub use model::{Block, Document, Output, OutputKind};
