//! Reference-semantics leaves: callables and opaque external objects.
//!
//! Both are compared and ordered by identity. Neither is copied by
//! snapshots, and neither has a plain-tree representation.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::Value;
use crate::error::CallbackError;

type CallFn = dyn Fn(&[Value]) -> Result<Value, CallbackError>;

// ---------------------------------------------------------------------------
// Callable
// ---------------------------------------------------------------------------

/// A function value. Method slots resolve to a `Callable` bound to their node.
#[derive(Clone)]
pub struct Callable(Rc<CallFn>);

impl Callable {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, CallbackError> + 'static,
    {
        Callable(Rc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, CallbackError> {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Callable) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<callable {:#x}>", self.addr())
    }
}

// ---------------------------------------------------------------------------
// Opaque
// ---------------------------------------------------------------------------

/// A shared handle to a value of a type the engine knows nothing about.
///
/// Opaque values cannot be frozen (unless exempted) or serialized.
#[derive(Clone)]
pub struct Opaque {
    type_name: &'static str,
    cell: Rc<RefCell<dyn Any>>,
}

impl Opaque {
    pub fn new<T: Any>(value: T) -> Self {
        Opaque {
            type_name: std::any::type_name::<T>(),
            cell: Rc::new(RefCell::new(value)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the inner value as `T`. `None` if the type does not match.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = self.cell.borrow();
        inner.downcast_ref::<T>().map(f)
    }

    pub fn with_mut<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut inner = self.cell.borrow_mut();
        inner.downcast_mut::<T>().map(f)
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        self.addr() == other.addr()
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.cell) as *const () as usize
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<opaque {}>", self.type_name)
    }
}
