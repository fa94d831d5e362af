//! Admin/introspection HTTP surface (§4.8): a stand-in for the explicitly
//! out-of-scope C/Python language bindings, exposing the `/proc`-like
//! virtual namespace over the network instead of over a local FFI call.

pub mod api;
