use std::any::{Any, TypeId};
use std::sync::Arc;

/// A shared handle to a stored value with its type erased.
///
/// Returned by the `*_raw` accessors of [`TypeStore`](crate::TypeStore). Use
/// [`Arc::downcast`] or `downcast_ref` to recover the concrete type.
pub type RawValue = Arc<dyn Any + Send + Sync>;

/// A container for type-erased values that preserves type information
#[derive(Debug, Clone)]
pub(crate) struct AnyValue {
    type_id: TypeId,
    type_name: &'static str,
    value: RawValue,
}

impl AnyValue {
    /// Create a new AnyValue from a value of any type that implements Any, Send, and Sync
    pub(crate) fn new<T: 'static + Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Arc::new(value),
        }
    }

    /// Check if the contained value is exactly of type T
    pub(crate) fn is_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub(crate) fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub(crate) fn raw(&self) -> &RawValue {
        &self.value
    }

    /// Get a reference to the contained value if it is of type T
    pub(crate) fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        if !self.is_type::<T>() {
            return None;
        }
        self.value.downcast_ref::<T>()
    }

    /// Get a mutable reference to the contained value if it is of type T.
    ///
    /// Returns `None` while another handle to the payload is alive.
    pub(crate) fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        if !self.is_type::<T>() {
            return None;
        }
        Arc::get_mut(&mut self.value)?.downcast_mut::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_type_match() {
        let value = AnyValue::new(42i32);
        assert!(value.is_type::<i32>());
        assert!(!value.is_type::<i64>());
        assert!(!value.is_type::<u32>());
        assert_eq!(value.downcast_ref::<i32>(), Some(&42));
        assert_eq!(value.downcast_ref::<i64>(), None);
    }

    #[test]
    fn test_type_name_is_captured_at_creation() {
        let value = AnyValue::new(String::from("hi"));
        assert_eq!(value.type_name(), "alloc::string::String");
        assert_eq!(value.type_id(), TypeId::of::<String>());
    }

    #[test]
    fn test_downcast_mut_requires_unique_payload() {
        let mut value = AnyValue::new(vec![1, 2]);
        let shared = Arc::clone(value.raw());
        assert!(value.downcast_mut::<Vec<i32>>().is_none());
        drop(shared);

        value.downcast_mut::<Vec<i32>>().unwrap().push(3);
        assert_eq!(value.downcast_ref::<Vec<i32>>(), Some(&vec![1, 2, 3]));
    }
}
