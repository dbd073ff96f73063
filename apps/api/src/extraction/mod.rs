pub mod extractor;
pub mod normalizer;
pub mod vocabulary;
