pub mod clustering;
pub mod coupling;
pub mod dendrogram;
pub mod discovery;
pub mod facts;
pub mod modules;
pub mod parser;
