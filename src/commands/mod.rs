pub mod clear;
pub mod export;
pub mod list;
pub mod view;
