//! Core types, traits and services for the Bulletin newsletter.
//!
//! This crate has no HTTP or database dependencies. Storage, mail delivery
//! and content lookup are reached through the traits in
//! [`store`], [`mail`] and [`content`]; the services in [`subscription`],
//! [`confirmation`] and [`delivery`] are written against those traits only.

// Native `async fn` in traits; the traits spell out their `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod confirmation;
pub mod content;
pub mod delivery;
pub mod error;
pub mod mail;
pub mod message;
pub mod report;
pub mod store;
pub mod subscriber;
pub mod subscription;
pub mod token;

pub use error::{Error, Result};
pub use mail::TransportError;

#[cfg(test)]
mod testing;
