pub mod cluster;
pub mod coupling;
pub mod dendrogram;
pub mod fact;
pub mod module;
pub mod pair;
pub mod request;
