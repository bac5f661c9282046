//! Name-keyed service registry shared between modules.
//!
//! - Providers publish an `Arc<T>` under a name (often from an `activate` hook).
//! - Consumers look it up by the same name and interface type; `T` may be a
//!   trait object such as `dyn SearchIndex`.
//! - Re-registering a name overwrites the previous value (last writer wins);
//!   `Arc`s already handed out stay valid.
//!
//! Values are stored as `Box<dyn Any>` wrapping the `Arc<T>` and downcast on read.

use parking_lot::RwLock;
use std::any::{type_name, Any};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service not found: {name}")]
    NotFound { name: String },

    #[error("service {name} is a {found}, not a {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

type Boxed = Box<dyn Any + Send + Sync>;

struct Entry {
    value: Boxed,
    type_name: &'static str,
}

/// Process-wide capability lookup table
pub struct ServiceRegistry {
    map: RwLock<HashMap<String, Entry>>,
}

impl ServiceRegistry {
    #[inline]
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    /// Store `service` under `name`, replacing any previous value
    pub fn register<T>(&self, name: impl Into<String>, service: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let name = name.into();
        let previous = self.map.write().insert(
            name.clone(),
            Entry {
                value: Box::new(service),
                type_name: type_name::<T>(),
            },
        );
        if previous.is_some() {
            debug!("Service {} replaced", name);
        } else {
            debug!("Service {} registered", name);
        }
    }

    /// Look up `name` as `T`; absent or differently-typed entries yield `None`
    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.try_get(name).ok()
    }

    /// Look up `name` as `T`, distinguishing a missing entry from a type mismatch
    pub fn try_get<T>(&self, name: &str) -> Result<Arc<T>, ServiceError>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let map = self.map.read();
        let entry = map.get(name).ok_or_else(|| ServiceError::NotFound {
            name: name.to_string(),
        })?;
        entry
            .value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(ServiceError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
                found: entry.type_name,
            })
    }

    /// Whether anything is registered under `name`
    pub fn has(&self, name: &str) -> bool {
        self.map.read().contains_key(name)
    }

    /// Remove `name`; returns false if nothing was registered
    pub fn remove(&self, name: &str) -> bool {
        self.map.write().remove(name).is_some()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;
    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    struct French;
    impl Greeter for French {
        fn greet(&self) -> String {
            "bonjour".to_string()
        }
    }

    #[test]
    fn test_last_registration_wins() {
        let services = ServiceRegistry::new();
        services.register::<dyn Greeter>("greeter", Arc::new(English));
        services.register::<dyn Greeter>("greeter", Arc::new(French));

        let greeter = services.get::<dyn Greeter>("greeter").unwrap();
        assert_eq!(greeter.greet(), "bonjour");
    }

    #[test]
    fn test_held_arc_survives_overwrite_and_remove() {
        let services = ServiceRegistry::new();
        services.register("counter", Arc::new(41u32));
        let held = services.get::<u32>("counter").unwrap();

        services.register("counter", Arc::new(42u32));
        assert!(services.remove("counter"));
        assert!(!services.remove("counter"));

        assert_eq!(*held, 41);
        assert!(!services.has("counter"));
        assert!(services.get::<u32>("counter").is_none());
    }

    #[test]
    fn test_type_mismatch() {
        let services = ServiceRegistry::new();
        services.register("cache", Arc::new(String::from("redis://")));

        assert!(services.has("cache"));
        assert!(services.get::<u64>("cache").is_none());
        match services.try_get::<u64>("cache") {
            Err(ServiceError::TypeMismatch { expected, found, .. }) => {
                assert_eq!(expected, "u64");
                assert!(found.ends_with("String"));
            }
            other => panic!("unexpected lookup result: {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            services.try_get::<u64>("missing"),
            Err(ServiceError::NotFound { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_get_returns_last_registered(values in proptest::collection::vec(any::<u64>(), 1..20)) {
            let services = ServiceRegistry::new();
            for v in &values {
                services.register("slot", Arc::new(*v));
            }
            let last = *values.last().unwrap();
            prop_assert_eq!(*services.get::<u64>("slot").unwrap(), last);
        }
    }
}
