/*! Utility types and data structures. */

use std::rc::Rc;

pub mod errors;

/// A [`HashMap`](std::collections::HashMap) with the `rustc-hash` hasher.
pub type HMap<A, B> = rustc_hash::FxHashMap<A, B>;

/// The reference counting pointer type used throughout the crate.
pub type Ptr<A> = Rc<A>;
