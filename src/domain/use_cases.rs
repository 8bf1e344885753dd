pub mod editor;
pub mod filter;
pub mod images;
pub mod projects;
