pub mod adoptions;
pub mod controller;
pub mod descriptor;
pub mod entities;
pub mod error;
pub mod ownership;
pub mod service;
