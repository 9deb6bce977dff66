mod fixtures;

pub use fixtures::{CategorisedCorpus, TestDataFactory};
