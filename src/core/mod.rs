pub mod engine;
pub mod extraction;
pub mod report;
pub mod splitter;
pub mod vector_store;

pub use crate::domain::model::{Document, DocumentMetadata, FileType};
pub use crate::domain::ports::{Embedder, LanguageModel, Mailer, Pipeline, Storage};
pub use crate::utils::error::Result;
