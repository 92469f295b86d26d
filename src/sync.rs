pub use std::sync::atomic;
pub use std::sync::Arc;

/// Lock shared between the cache and the transports it is wired to.
#[cfg(feature = "parking_lot")]
pub mod parking_lot {
    #[repr(transparent)]
    #[derive(Debug, Default)]
    pub struct Mutex<T: ?Sized>(parking_lot::Mutex<T>);

    impl<T> Mutex<T> {
        #[must_use]
        pub fn new(value: T) -> Self {
            Self(parking_lot::Mutex::new(value))
        }

        #[must_use]
        pub fn into_inner(self) -> T {
            self.0.into_inner()
        }
    }

    impl<T: ?Sized> Mutex<T> {
        pub fn lock(&self) -> parking_lot::MutexGuard<T> {
            self.0.lock()
        }
    }
}

#[cfg(not(feature = "parking_lot"))]
pub mod default {
    use std::sync::PoisonError;

    #[repr(transparent)]
    #[derive(Debug, Default)]
    pub struct Mutex<T: ?Sized>(std::sync::Mutex<T>);

    impl<T> Mutex<T> {
        #[must_use]
        pub fn new(value: T) -> Self {
            Self(std::sync::Mutex::new(value))
        }

        #[must_use]
        pub fn into_inner(self) -> T {
            self.0.into_inner().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl<T: ?Sized> Mutex<T> {
        /// Locks the mutex, ignoring poisoning by a panicked holder.
        pub fn lock(&self) -> std::sync::MutexGuard<T> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}

#[cfg(feature = "parking_lot")]
pub use self::parking_lot::Mutex;

#[cfg(not(feature = "parking_lot"))]
pub use default::Mutex;
