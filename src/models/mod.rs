// src/models/mod.rs

pub mod dashboard;
pub mod exam;
pub mod issue;
pub mod question;
pub mod submission;
pub mod user;
