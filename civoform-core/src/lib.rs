//! Civoform Core
//!
//! Core library for declaring Civo infrastructure: the value model, schemas,
//! the provider abstraction, planning and applying, plus the list and polling
//! helpers shared by every resource.

pub mod datalist;
pub mod differ;
pub mod effect;
pub mod interpreter;
pub mod parser;
pub mod plan;
pub mod provider;
pub mod resolver;
pub mod resource;
pub mod schema;
pub mod waiter;
