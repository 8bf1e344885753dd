pub mod block;
pub mod image;
pub mod option_fields;
pub mod project;
