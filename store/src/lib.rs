//! # Store
//!
//! The relational side of the system: product rows with pgvector
//! embedding columns. The core only reads and writes the embedding
//! columns and searches by cosine distance; product lifecycle belongs
//! to the wider platform.
//!
//! Embeddings cross the wire as bracketed numeric-literal strings
//! (`[0.1,0.2,...]`) cast to `vector` inside the query, which keeps
//! parameter binding plain text.

pub mod error;
pub mod products;
pub mod vector;

pub use error::{Result, StoreError};
pub use products::{
    PendingProduct, ProductEmbeddings, ProductHit, ProductStore, SearchFilter,
};
pub use vector::{parse_pg_vector, vector_to_pg};
