//! Pin metadata: runtime type tags and pin definitions.

use std::any::TypeId;
use std::fmt;

/// Runtime type tag for a pin.
///
/// Any `'static` Rust type can flow through a pin; the tag is the type's
/// identity plus its name for diagnostics. Two pins are compatible when
/// their tags are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinType {
    id: TypeId,
    name: &'static str,
}

impl PinType {
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Definition of an input pin on a node.
#[derive(Debug, Clone)]
pub struct InputPin {
    /// Name used for connections (e.g. "mesh_in", "amount").
    pub name: String,
    pub pin_type: PinType,
    /// Whether the node may consume/transform the incoming value
    /// destructively. Only consumable inputs are eligible to take ownership
    /// of an upstream value.
    pub consumable: bool,
}

impl InputPin {
    pub fn new<T: 'static>(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pin_type: PinType::of::<T>(),
            consumable: false,
        }
    }

    pub fn consumable(mut self) -> Self {
        self.consumable = true;
        self
    }
}

/// Definition of an output pin on a node.
#[derive(Debug, Clone)]
pub struct OutputPin {
    pub name: String,
    pub pin_type: PinType,
}

impl OutputPin {
    pub fn new<T: 'static>(name: &str) -> Self {
        Self {
            name: name.to_string(),
            pin_type: PinType::of::<T>(),
        }
    }
}
