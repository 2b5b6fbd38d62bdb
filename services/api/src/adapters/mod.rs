pub mod db;
pub mod media;

pub use db::PgDocumentStore;
pub use media::LocalObjectStore;
