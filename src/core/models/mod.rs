pub mod answer;
pub mod common;
pub mod form;
pub mod option;
pub mod question;
pub mod submission;
pub mod user;
