pub mod annotation;
pub mod field;
pub mod sample;
pub mod view;
