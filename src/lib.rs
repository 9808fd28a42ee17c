//! # a3s-intercept
//!
//! Proxy synthesis and call interception for the A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-intercept` derives, at runtime, a proxy type from a described class
//! or interface. The proxy is substitutable for the original but routes
//! selected member calls (methods, property accessors, indexers, event
//! add/remove) through an ordered chain of interceptors before the real
//! implementation runs.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_intercept::{
//!     Call, Instance, Interceptor, InterceptorFactory, Invocation, MethodDescriptor, Outcome,
//!     ProxyGenerator, ProxyOptions, TypeDescriptor, TypeRef, Value,
//! };
//! use std::sync::Arc;
//!
//! struct Calculator;
//!
//! impl Instance for Calculator {
//!     fn type_name(&self) -> &str {
//!         "Calculator"
//!     }
//!
//!     fn is_a(&self, type_name: &str) -> bool {
//!         type_name == "Calculator" || type_name == "ICalculator"
//!     }
//!
//!     fn invoke(&self, call: Call<'_>) -> a3s_intercept::Result<Outcome> {
//!         let a = call.arg(0)?.as_i64().unwrap_or_default();
//!         let b = call.arg(1)?.as_i64().unwrap_or_default();
//!         Ok(Outcome::ready(a + b))
//!     }
//! }
//!
//! # fn example() -> a3s_intercept::Result<()> {
//! let calculator = TypeDescriptor::interface("ICalculator")
//!     .method(
//!         MethodDescriptor::new("Add")
//!             .param("a", TypeRef::Int)
//!             .param("b", TypeRef::Int)
//!             .returns(TypeRef::Int),
//!     )
//!     .build();
//!
//! let generator = ProxyGenerator::new(InterceptorFactory::new());
//! let doubler: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> a3s_intercept::Result<()> {
//!     invocation.proceed()?;
//!     let result = invocation.return_value().as_i64().unwrap_or_default();
//!     invocation.set_return_value(result * 2);
//!     Ok(())
//! });
//!
//! let proxy = generator.create_interface_proxy_with_target(
//!     &calculator,
//!     Arc::new(Calculator),
//!     &ProxyOptions::new(),
//!     &[doubler],
//! )?;
//!
//! assert_eq!(proxy.call("Add", vec![2.into(), 3.into()])?, Value::Int(10));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **TypeDescriptor** — declarative description of the source type
//! - **TypeDefinition** — reflected members with selection and resolved chains
//! - **MemberSelector** — policy deciding which members are intercepted
//! - **InterceptorResolver** — merges declared and caller-supplied interceptors
//! - **BuildPlan** — frozen input to synthesis
//! - **ProxyBackend** trait — turns a plan into a `ProxyType` dispatch table
//! - **TypeRegistry** — exactly-once synthesis per (type, options)
//! - **ProxyGenerator** — public entry point and `TypeCreated` notifications
//! - **Invocation** — per-call context and its `proceed()` state machine

pub mod binding;
pub mod definition;
pub mod descriptor;
pub mod error;
pub mod generator;
pub mod instance;
pub mod interceptor;
pub mod invocation;
pub mod options;
pub mod plan;
pub mod proxy;
pub mod registry;
pub mod resolver;
pub mod selector;
pub mod synth;
pub mod value;

// Re-export core types
pub use binding::{Binding, InterceptorFactory, InterceptorManifest, ProviderDescriptor, Role};
pub use definition::{
    EventDefinition, MemberDefinition, MethodDefinition, ParameterDefinition, PropertyDefinition,
    ProxyKind, TypeDefinition,
};
pub use descriptor::{
    Constructor, EventDescriptor, MemberDescriptor, MemberKey, MethodDescriptor, Modifiers, Origin,
    ParameterDescriptor, PropertyDescriptor, RefKind, TypeDescriptor, TypeKind,
};
pub use error::{InterceptError, Result};
pub use generator::{ProxyGenerator, TypeCreated};
pub use instance::{Call, HandlerList, Instance, Outcome};
pub use interceptor::{Interceptor, Lifecycle, LifecycleInterceptor, NotifyPropertyChanged};
pub use invocation::{AwaitableContext, CompletionHook, Invocation, InvocationState};
pub use options::{AccessorPolicy, InterceptorOrder, Mixin, ProxyConfig, ProxyOptions};
pub use plan::{BuildPlan, CallbackIntent, PlannedMember};
pub use proxy::Proxy;
pub use registry::{RegistryKey, TypeRegistry};
pub use resolver::{ChainSlot, ChainTemplate, InterceptorResolver};
pub use selector::{DefaultMemberSelector, MemberSelector};
pub use synth::{DispatchBackend, Forwarder, MemberSynthesizer, ProxyBackend, ProxyType};
pub use value::{Handler, TypeRef, Value};
