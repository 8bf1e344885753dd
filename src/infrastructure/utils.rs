pub mod html;
pub mod image_file;
pub mod valid_id;
