pub mod home;
pub mod images;
pub mod projects;
pub mod system;
