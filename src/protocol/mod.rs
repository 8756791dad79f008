//! Request, response and upstream wire models.

pub mod models;
