//! The value box flowing through pins, with an explicit ownership state.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::GraphError;
use crate::model::pin::PinType;

/// Capability trait for pin payloads.
///
/// A blanket impl covers every `T: Any + Send + Sync + Clone + Debug`, so
/// payload authors implement nothing by hand.
pub trait PinData: Any + Send + Sync + fmt::Debug {
    fn clone_boxed(&self) -> Box<dyn PinData>;
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
    fn pin_type(&self) -> PinType;
}

impl<T> PinData for T
where
    T: Any + Send + Sync + Clone + fmt::Debug,
{
    fn clone_boxed(&self) -> Box<dyn PinData> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }

    fn pin_type(&self) -> PinType {
        PinType::of::<T>()
    }
}

/// A boxed pin value with an explicit ownership state.
///
/// `Owned` values are held exclusively and may be mutated or consumed by
/// their holder; transferring one is a checked move, never a copy. `Shared`
/// values are read-only handouts; the producing node keeps an aliasing
/// `Shared` in its cache slot.
#[derive(Debug)]
pub enum PinValue {
    Owned(Box<dyn PinData>),
    Shared(Arc<dyn PinData>),
}

impl PinValue {
    pub fn new<T: PinData>(value: T) -> Self {
        PinValue::Owned(Box::new(value))
    }

    pub fn pin_type(&self) -> PinType {
        match self {
            PinValue::Owned(value) => (**value).pin_type(),
            PinValue::Shared(value) => (**value).pin_type(),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, PinValue::Owned(_))
    }

    /// Borrow the payload as a concrete type.
    pub fn downcast_ref<T: PinData>(&self) -> Result<&T, GraphError> {
        let found = self.pin_type();
        self.as_any().downcast_ref::<T>().ok_or_else(|| {
            GraphError::UnmatchedTypes {
                expected: PinType::of::<T>(),
                found,
            }
        })
    }

    /// Consume the box into a concrete value. Zero-copy on the `Owned`
    /// path; a `Shared` value is cloned out.
    pub fn extract<T: PinData + Clone>(self) -> Result<T, GraphError> {
        let found = self.pin_type();
        let mismatch = || GraphError::UnmatchedTypes {
            expected: PinType::of::<T>(),
            found,
        };
        match self {
            PinValue::Owned(value) => value.into_any().downcast::<T>().map(|v| *v).map_err(|_| mismatch()),
            PinValue::Shared(value) => (*value).as_any().downcast_ref::<T>().cloned().ok_or_else(mismatch),
        }
    }

    /// Take the payload as an exclusively owned box, cloning only when it is
    /// still aliased by a `Shared` handout.
    pub fn into_owned(self) -> Box<dyn PinData> {
        match self {
            PinValue::Owned(value) => value,
            PinValue::Shared(value) => value.clone_boxed(),
        }
    }

    pub(crate) fn into_shared(self) -> Arc<dyn PinData> {
        match self {
            PinValue::Owned(value) => Arc::from(value),
            PinValue::Shared(value) => value,
        }
    }

    fn as_any(&self) -> &dyn Any {
        match self {
            PinValue::Owned(value) => (**value).as_any(),
            PinValue::Shared(value) => (**value).as_any(),
        }
    }
}
