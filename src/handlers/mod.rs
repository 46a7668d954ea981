// src/handlers/mod.rs

pub mod auth;
pub mod dashboard;
pub mod exam;
pub mod health;
pub mod issue;
pub mod lookup;
pub mod question;
pub mod student;
pub mod teacher;
