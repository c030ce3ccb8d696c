//! 内置动作插件

mod attribute;
mod header;
mod persona;
mod tags;

pub use attribute::{AttributeInstance, SetRequestAttributeActionlet};
pub use header::{HeaderInstance, SetResponseHeaderActionlet};
pub use persona::{PersonaDirectory, SetPersonaActionlet, StaticPersonaDirectory};
#[cfg(test)]
pub use persona::MockPersonaDirectory;
pub use tags::TagVisitorActionlet;
