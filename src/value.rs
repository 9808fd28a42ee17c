//! Dynamic values and type references
//!
//! Parameters and return values travel through the interceptor chain as
//! boxed `Value`s. `TypeRef` describes declared types on member signatures
//! and performs the final cast of a captured return value.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A boxed parameter or return value
#[derive(Clone, Default)]
pub enum Value {
    /// No value; the default for reference-like types and `void`
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    /// Arbitrary structured data
    Json(serde_json::Value),
    /// Event delegate
    Handler(Handler),
}

impl Value {
    /// Short name of the value's kind, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Json(_) => "json",
            Value::Handler(_) => "handler",
        }
    }

    /// Convert JSON data: scalars and arrays map onto native variants,
    /// objects stay structured
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Unit,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from_json).collect())
            }
            object => Value::Json(object),
        }
    }

    pub fn is_unit(&self) -> bool {
        matches!(self, Value::Unit)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Value::Handler(h) => Some(h),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("Unit"),
            Value::Bool(b) => write!(f, "Bool({})", b),
            Value::Int(i) => write!(f, "Int({})", i),
            Value::Float(x) => write!(f, "Float({})", x),
            Value::Str(s) => write!(f, "Str({:?})", s),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Json(j) => write!(f, "Json({})", j),
            Value::Handler(h) => write!(f, "{:?}", h),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => f.write_str("()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Json(j) => write!(f, "{}", j),
            Value::Handler(_) => f.write_str("<handler>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Value::Handler(h)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Event delegate
///
/// Two handlers are equal only when they share the same allocation, so a
/// clone of a subscribed handler can be used to unsubscribe it.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&[Value]) + Send + Sync>);

impl Handler {
    pub fn new(f: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the delegate with event arguments
    pub fn invoke(&self, args: &[Value]) {
        (self.0)(args)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Declared type on a member signature
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeRef {
    Void,
    Bool,
    Int,
    Float,
    Str,
    List,
    Json,
    Handler,
    /// Opaque named type; accepts any value
    Named(String),
    /// Generic placeholder bound per call
    Generic(String),
    /// Awaitable producing the inner type
    Task(Box<TypeRef>),
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn generic(name: impl Into<String>) -> Self {
        TypeRef::Generic(name.into())
    }

    pub fn task(inner: TypeRef) -> Self {
        TypeRef::Task(Box::new(inner))
    }

    pub fn is_void(&self) -> bool {
        matches!(self, TypeRef::Void)
    }

    pub fn is_awaitable(&self) -> bool {
        matches!(self, TypeRef::Task(_))
    }

    /// Type produced once the value is awaited
    pub fn awaited(&self) -> &TypeRef {
        match self {
            TypeRef::Task(inner) => inner,
            other => other,
        }
    }

    /// Substitute generic placeholders with the bound arguments
    pub fn bind(&self, bindings: &HashMap<String, TypeRef>) -> TypeRef {
        match self {
            TypeRef::Generic(name) => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            TypeRef::Task(inner) => TypeRef::Task(Box::new(inner.bind(bindings))),
            other => other.clone(),
        }
    }

    /// Default value produced when a call is short-circuited
    pub fn default_value(&self) -> Value {
        match self.awaited() {
            TypeRef::Bool => Value::Bool(false),
            TypeRef::Int => Value::Int(0),
            TypeRef::Float => Value::Float(0.0),
            _ => Value::Unit,
        }
    }

    /// Whether a value can be cast to this declared type
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (TypeRef::Void, Value::Unit) => true,
            (TypeRef::Void, _) => false,
            (TypeRef::Bool, Value::Bool(_)) => true,
            (TypeRef::Int, Value::Int(_)) => true,
            (TypeRef::Float, Value::Float(_) | Value::Int(_)) => true,
            (TypeRef::Bool | TypeRef::Int | TypeRef::Float, _) => false,
            (TypeRef::Str, Value::Str(_) | Value::Unit) => true,
            (TypeRef::List, Value::List(_) | Value::Unit) => true,
            (TypeRef::Json, _) => true,
            (TypeRef::Handler, Value::Handler(_) | Value::Unit) => true,
            (TypeRef::Str | TypeRef::List | TypeRef::Handler, _) => false,
            (TypeRef::Named(_) | TypeRef::Generic(_), _) => true,
            (TypeRef::Task(inner), v) => inner.accepts(v),
        }
    }

    /// Convert `value` to this declared type, or `None` when it cannot be
    pub fn cast(&self, value: Value) -> Option<Value> {
        if !self.accepts(&value) {
            return None;
        }
        Some(match (self.awaited(), value) {
            (TypeRef::Float, Value::Int(i)) => Value::Float(i as f64),
            (_, value) => value,
        })
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Void => f.write_str("void"),
            TypeRef::Bool => f.write_str("bool"),
            TypeRef::Int => f.write_str("int"),
            TypeRef::Float => f.write_str("float"),
            TypeRef::Str => f.write_str("str"),
            TypeRef::List => f.write_str("list"),
            TypeRef::Json => f.write_str("json"),
            TypeRef::Handler => f.write_str("handler"),
            TypeRef::Named(name) | TypeRef::Generic(name) => f.write_str(name),
            TypeRef::Task(inner) if inner.is_void() => f.write_str("Task"),
            TypeRef::Task(inner) => write!(f, "Task<{}>", inner),
        }
    }
}
