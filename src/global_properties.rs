//! Global properties are model-wide configuration values held in the `Context`.
//!
//! Each property is a type defined with [`define_global_property!`] that names
//! its value type and an optional validator. Values can be set in code or
//! loaded from a JSON file, and are validated either way.
use std::any::{Any, TypeId};
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimError;
use crate::hashing::HashMap;
use crate::trace;

/// Defines a global property with the given value type and, optionally, a
/// validation function `fn(&Value) -> Result<(), SimError>`.
#[macro_export]
macro_rules! define_global_property {
    ($global_property:ident, $value:ty, $validate:expr) => {
        #[derive(Copy, Clone)]
        pub struct $global_property;

        impl $crate::global_properties::GlobalProperty for $global_property {
            type Value = $value;

            fn validate(value: &$value) -> Result<(), $crate::error::SimError> {
                $validate(value)
            }
        }
    };

    ($global_property:ident, $value:ty) => {
        $crate::define_global_property!($global_property, $value, |_| Ok(()));
    };
}
pub use define_global_property;

pub trait GlobalProperty: Any {
    type Value: Any;

    /// # Errors
    /// Returns `SimError` if the value is not acceptable for this property.
    fn validate(value: &Self::Value) -> Result<(), SimError>;
}

struct GlobalPropertiesDataContainer {
    global_property_container: HashMap<TypeId, Box<dyn Any>>,
}

define_data_plugin!(
    GlobalPropertiesPlugin,
    GlobalPropertiesDataContainer,
    GlobalPropertiesDataContainer {
        global_property_container: HashMap::default(),
    }
);

pub trait ContextGlobalPropertiesExt {
    /// Validates and stores `value`, replacing any previous value.
    ///
    /// # Errors
    /// Returns the validator's error and leaves the previous value in place.
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        property: T,
        value: T::Value,
    ) -> Result<(), SimError>;

    fn get_global_property_value<T: GlobalProperty>(&self, property: T) -> Option<&T::Value>;

    /// Reads a JSON file into the property's value type and stores it.
    ///
    /// # Errors
    /// Returns `SimError` if the file cannot be read or parsed, or the value is invalid.
    fn load_global_property<T: GlobalProperty>(
        &mut self,
        property: T,
        file_name: &Path,
    ) -> Result<(), SimError>
    where
        T::Value: DeserializeOwned;
}

impl ContextGlobalPropertiesExt for Context {
    fn set_global_property_value<T: GlobalProperty>(
        &mut self,
        _property: T,
        value: T::Value,
    ) -> Result<(), SimError> {
        T::validate(&value)?;
        let data_container = self.get_data_mut(GlobalPropertiesPlugin);
        data_container
            .global_property_container
            .insert(TypeId::of::<T>(), Box::new(value));
        Ok(())
    }

    fn get_global_property_value<T: GlobalProperty>(&self, _property: T) -> Option<&T::Value> {
        self.get_data(GlobalPropertiesPlugin)?
            .global_property_container
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T::Value>())
    }

    fn load_global_property<T: GlobalProperty>(
        &mut self,
        property: T,
        file_name: &Path,
    ) -> Result<(), SimError>
    where
        T::Value: DeserializeOwned,
    {
        trace!("loading global property from {}", file_name.display());
        let config_file = fs::read_to_string(file_name)?;
        let value: T::Value = serde_json::from_str(&config_file)?;
        self.set_global_property_value(property, value)
    }
}
