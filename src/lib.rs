//! QuickQuest: classroom exams shown one question at a time, each with its
//! own countdown that advances automatically.

pub mod cli;
pub mod commands;
pub mod platform;
pub mod quiz;
pub mod session;
pub mod settings;
