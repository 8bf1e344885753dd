pub mod entities;
pub mod rendering;
pub mod use_cases;
