//! Profiling support via Tracy.
//!
//! Arena and device operations are instrumented with the macros below. They
//! forward to [`tracy_client`] when the `profiling` feature is enabled and
//! compile to nothing otherwise.
//!
//! ```bash
//! cargo run --features profiling
//! ```
//!
//! Call [`crate::init`] once so the Tracy client is running before the first
//! span is recorded.
//!
//! ```ignore
//! use redlilium_geometry::profiling::{profile_function, profile_scope};
//!
//! fn import_meshes() {
//!     profile_function!();
//!
//!     {
//!         profile_scope!("upload");
//!         // ...
//!     }
//! }
//! ```

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, plot as tracy_plot, span_location};

/// Create a profiling span that lasts until the end of the enclosing scope.
///
/// Records nothing while no Tracy client is running.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|client| client.span($crate::profiling::span_location!($name), 0));
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Create a profiling span for the entire function.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_function {
    () => {
        let _profile_span = $crate::profiling::Client::running()
            .map(|client| client.span($crate::profiling::span_location!(), 0));
    };
}

/// Create a profiling span for function (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_function {
    () => {};
}

/// Plot a value over time in Tracy.
///
/// ```ignore
/// profile_plot!("geometry_vertex_count", arena.vertex_count());
/// ```
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_plot {
    ($name:literal, $value:expr) => {
        if $crate::profiling::Client::running().is_some() {
            $crate::profiling::tracy_plot!($name, $value as f64);
        }
    };
}

/// Plot a value (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_plot {
    ($name:literal, $value:expr) => {
        let _ = &$value;
    };
}

pub use profile_function;
pub use profile_plot;
pub use profile_scope;
