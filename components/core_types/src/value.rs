//! JavaScript value representation.
//!
//! This module provides the `Value` enum that the promise engine treats as
//! an opaque payload: resolution values, rejection reasons, handler
//! arguments and return values are all `Value`s.

use crate::JsError;
use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Represents any JavaScript value.
///
/// Primitive values are stored inline. Engine objects (promises, thenables,
/// embedding objects) are carried as [`Value::NativeObject`] and recognised
/// by downcasting.
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let undefined = Value::Undefined;
/// let number = Value::Smi(42);
/// let list = Value::Array(vec![Value::from("a"), Value::from("b")]);
///
/// assert!(!undefined.is_truthy());
/// assert!(number.is_truthy());
/// assert_eq!(list.to_string(), "a,b");
/// ```
#[derive(Clone)]
pub enum Value {
    /// JavaScript undefined value
    Undefined,
    /// JavaScript null value
    Null,
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// Small integer
    Smi(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// JavaScript string value
    String(String),
    /// Dense array of values
    Array(Vec<Value>),
    /// Error object, typically a rejection reason produced by the engine
    Error(Box<JsError>),
    /// Native object (promise, thenable, embedding object)
    NativeObject(Rc<RefCell<dyn Any>>),
    /// Native function reference by name
    NativeFunction(String),
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "Undefined"),
            Value::Null => write!(f, "Null"),
            Value::Boolean(b) => f.debug_tuple("Boolean").field(b).finish(),
            Value::Smi(n) => f.debug_tuple("Smi").field(n).finish(),
            Value::Double(n) => f.debug_tuple("Double").field(n).finish(),
            Value::String(s) => f.debug_tuple("String").field(s).finish(),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Error(e) => f.debug_tuple("Error").field(e).finish(),
            Value::NativeObject(_) => write!(f, "NativeObject(...)"),
            Value::NativeFunction(name) => f.debug_tuple("NativeFunction").field(name).finish(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Smi(a), Value::Smi(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            // Objects compare by identity
            (Value::NativeObject(a), Value::NativeObject(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction(a), Value::NativeFunction(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Wraps a native object so it can travel through the engine as a value.
    pub fn native<T: Any>(object: T) -> Self {
        Value::NativeObject(Rc::new(RefCell::new(object)) as Rc<RefCell<dyn Any>>)
    }

    /// Returns a clone of the wrapped native object if it has type `T`.
    ///
    /// Returns `None` for primitives, for native objects of another type and
    /// for objects that are currently mutably borrowed.
    pub fn downcast_native<T: Any + Clone>(&self) -> Option<T> {
        match self {
            Value::NativeObject(obj) => {
                let borrowed = obj.try_borrow().ok()?;
                borrowed.downcast_ref::<T>().cloned()
            }
            _ => None,
        }
    }

    /// Returns true if this value is a native object of type `T`.
    pub fn is_native<T: Any>(&self) -> bool {
        match self {
            Value::NativeObject(obj) => obj.try_borrow().map(|o| o.is::<T>()).unwrap_or(false),
            _ => false,
        }
    }

    /// Returns whether this value is truthy in JavaScript semantics.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Smi(0).is_truthy());
    /// assert!(!Value::Double(f64::NAN).is_truthy());
    /// assert!(Value::Array(vec![]).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Smi(n) => *n != 0,
            Value::Double(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Array(_)
            | Value::Error(_)
            | Value::NativeObject(_)
            | Value::NativeFunction(_) => true,
        }
    }

    /// Returns the JavaScript typeof result for this value.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // JavaScript quirk
            Value::Boolean(_) => "boolean",
            Value::Smi(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) | Value::Error(_) | Value::NativeObject(_) => "object",
            Value::NativeFunction(_) => "function",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Smi(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

/// Follows JavaScript's `String()` conversion rules.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Smi(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    let sign = if n.is_sign_positive() { "" } else { "-" };
                    write!(f, "{}Infinity", sign)
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    // undefined and null render as empty inside arrays
                    if !matches!(item, Value::Undefined | Value::Null) {
                        write!(f, "{}", item)?;
                    }
                }
                Ok(())
            }
            Value::Error(e) => write!(f, "{}", e),
            Value::NativeObject(_) => write!(f, "[object Object]"),
            Value::NativeFunction(name) => write!(f, "function {}() {{ [native code] }}", name),
        }
    }
}
