//! Core abstractions for Vanish: the `Secret` entity, the capability contracts
//! the save path depends on, and the `SaveSecret` use case that composes them.
//! Concrete crypto and persistence live in sibling crates.

pub mod cipher;
pub mod clock;
pub mod id;
pub mod save_secret;
pub mod secret;
pub mod storage;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
