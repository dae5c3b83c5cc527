/// Declares a method that makes a trait impossible to implement outside of this crate.
macro_rules! private_decl {
    () => {
        /// This trait is private to implement; this method exists to make it
        /// impossible to implement outside the crate.
        #[doc(hidden)]
        fn __private__(&self) -> crate::private::PrivateMarker;
    };
}

/// Implements the method declared by [`private_decl`].
macro_rules! private_impl {
    () => {
        fn __private__(&self) -> crate::private::PrivateMarker {
            crate::private::PrivateMarker
        }
    };
}

/// Marker type returned by sealed trait methods.
pub struct PrivateMarker;
