//! # sovran-keystore
//!
//! A thread-safe in-memory key-value store with type-checked access and
//! optional expiry.
//!
//! `sovran-keystore` provides two stores built on the same core, a single
//! reader-writer lock around one backing map:
//!
//! - [`TypeStore`] keeps values of *any* type under one key type. Every typed
//!   read, check or delete names the type it expects and only matches values
//!   stored as exactly that type. The `*_raw` variants ignore types.
//! - [`TypeStoreV`] keeps values of one fixed type and adds time-to-live
//!   entries, evicted by a background sweep running on Tokio.
//!
//! ## Key Features
//!
//! - **Type-checked**: a lookup with the wrong type behaves like a missing key
//! - **Thread-safe**: concurrent readers, exclusive writers, no lock poisoning
//! - **Lazy**: storage is allocated on the first write, exactly once
//! - **Expiry**: `set_with_ttl` plus a cancellable sweep with an eviction callback
//! - **No errors on lookups**: absence is `None` / `false`, never an `Err`
//!
//! ## Usage Examples
//!
//! ### Typed Access
//!
//! ```rust
//! use sovran_keystore::TypeStore;
//!
//! let store = TypeStore::<String>::new();
//!
//! // Store values of different types
//! store.set("number".to_string(), 42i32);
//! store.set("text".to_string(), "Hello, world!".to_string());
//! store.set("data".to_string(), vec![1, 2, 3, 4, 5]);
//!
//! // Retrieve values, naming the type
//! assert_eq!(store.get::<i32>(&"number".to_string()), Some(42));
//! assert_eq!(store.get::<String>(&"text".to_string()).as_deref(), Some("Hello, world!"));
//!
//! // The wrong type is reported like a missing key
//! assert_eq!(store.get::<i64>(&"number".to_string()), None);
//! assert!(!store.delete::<bool>(&"number".to_string()));
//!
//! // Filtered views
//! assert_eq!(store.len(), 3);
//! assert_eq!(store.len_of::<i32>(), 1);
//! assert_eq!(store.keys_of::<Vec<i32>>(), vec!["data".to_string()]);
//! ```
//!
//! ### Raw Access
//!
//! ```rust
//! use sovran_keystore::TypeStore;
//!
//! let store = TypeStore::<u32>::new();
//! store.set(1, 5.2f64);
//!
//! let raw = store.get_raw(&1).unwrap();
//! assert_eq!(raw.downcast_ref::<f64>(), Some(&5.2));
//! assert_eq!(store.type_name(&1), Some("f64"));
//! assert!(store.delete_raw(&1));
//! ```
//!
//! ### Sharing State Between Components
//!
//! ```rust
//! use sovran_keystore::TypeStore;
//!
//! struct UserService {
//!     store: TypeStore<&'static str>,
//! }
//!
//! impl UserService {
//!     fn add_user(&self, username: &str) {
//!         if !self.store.has::<Vec<String>>(&"users") {
//!             self.store.set("users", Vec::<String>::new());
//!         }
//!         self.store.with_mut(&"users", |users: &mut Vec<String>| {
//!             users.push(username.to_string());
//!         });
//!     }
//!
//!     fn user_count(&self) -> usize {
//!         self.store.with(&"users", |users: &Vec<String>| users.len()).unwrap_or(0)
//!     }
//! }
//!
//! // Clones share the same map
//! let store = TypeStore::new();
//! let users = UserService { store: store.clone() };
//!
//! users.add_user("alice");
//! users.add_user("bob");
//!
//! assert_eq!(users.user_count(), 2);
//! assert!(store.has::<Vec<String>>(&"users"));
//! ```
//!
//! ### Expiring Entries
//!
//! ```rust,no_run
//! use sovran_keystore::{StoreError, SweepConfig, TypeStoreV};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StoreError> {
//!     let sessions = TypeStoreV::<String, u64>::new();
//!
//!     let sweep = sessions.expire_sweep_with(
//!         SweepConfig::every(Duration::from_secs(1)),
//!         |id, user| println!("session {id} of user {user} expired"),
//!     )?;
//!
//!     sessions.set_with_ttl("abc".to_string(), 7, Duration::from_secs(30));
//!     sessions.set("admin".to_string(), 1); // never expires
//!
//!     // ... later
//!     sweep.stop().await;
//!     Ok(())
//! }
//! ```

mod any_value;
mod config;
mod entry;
mod error;
mod locked;
mod store;
mod sweep;
mod typed;

pub use any_value::RawValue;
pub use config::SweepConfig;
pub use entry::Entry;
pub use error::StoreError;
pub use store::TypeStore;
pub use sweep::SweepHandle;
pub use typed::TypeStoreV;

// Re-export std::any for convenience
pub use std::any::{Any, TypeId};
