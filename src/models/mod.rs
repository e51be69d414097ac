//! Data models for the travel management application.
//!
//! These models match the frontend TypeScript interfaces exactly for seamless interoperability.

mod esg;
mod expense;
mod itinerary;
mod policy;
mod risk;
mod safety;
mod trip;
mod user;

pub use esg::*;
pub use expense::*;
pub use itinerary::*;
pub use policy::*;
pub use risk::*;
pub use safety::*;
pub use trip::*;
pub use user::*;
