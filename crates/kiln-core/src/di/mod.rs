//! Component-based dependency injection.
//!
//! The moving parts:
//!
//! | Type | Role |
//! |------|------|
//! | [`Parameter`] | a declared parameter: name, type, optionality |
//! | [`Callable`] | a function plus the parameters it declares |
//! | [`Component`] | provides values for the parameters it claims |
//! | [`Resolver`] | fills a callable's parameters for one request |
//! | [`DependencyInjector`] | registry plus startup singleton bootstrap |

mod callable;
mod component;
mod injector;
mod instances;
mod parameter;
mod resolver;
mod value;

pub use callable::{Arguments, Callable, CallableBuilder};
pub use component::{Component, ComponentId, Provider};
pub use injector::DependencyInjector;
pub use instances::{InstanceKey, InstanceMap};
pub use parameter::{Coerce, Parameter, TypeInfo};
pub use resolver::{Resolved, Resolver};
pub use value::Value;
