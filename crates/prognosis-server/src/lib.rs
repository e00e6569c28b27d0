//! HTTP front end for the prognosis service

pub mod api;
pub mod config;
