//! Proxy integration tests
//!
//! End-to-end tests driving the `ProxyGenerator` against a described
//! `Document` class. Covers type caching, chain ordering, short-circuiting,
//! by-ref write-back, clean properties, events, indexers, generics, mixins,
//! overloads, concurrent synthesis and error propagation.

use a3s_intercept::{
    BuildPlan, Call, DispatchBackend, EventDescriptor, Handler, HandlerList, Instance,
    InterceptError, Interceptor, InterceptorFactory, InterceptorManifest, InterceptorOrder,
    Invocation, InvocationState, Lifecycle, LifecycleInterceptor, MethodDescriptor, Mixin,
    Outcome, PropertyDescriptor, ProviderDescriptor, ProxyBackend, ProxyConfig, ProxyGenerator,
    ProxyOptions, ProxyType, Result, Role, TypeDescriptor, TypeRef, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

type Log = Arc<Mutex<Vec<String>>>;

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ─── Fixture ─────────────────────────────────────────────────────

#[derive(Default)]
struct DocumentState {
    title: Mutex<Value>,
    body: Mutex<Value>,
    pages: Mutex<HashMap<i64, Value>>,
    saved: HandlerList,
    notifications: Mutex<Vec<String>>,
    log: Log,
}

struct Document {
    state: Arc<DocumentState>,
}

impl Instance for Document {
    fn type_name(&self) -> &str {
        "Document"
    }

    fn is_a(&self, type_name: &str) -> bool {
        type_name == "Document" || type_name == "IDocument"
    }

    fn invoke(&self, mut call: Call<'_>) -> Result<Outcome> {
        let state = &self.state;
        state.log.lock().unwrap().push("callback".to_string());

        match (call.member.name.as_str(), call.member.role) {
            ("Title", Role::Get) => Ok(Outcome::Ready(state.title.lock().unwrap().clone())),
            ("Title", Role::Set) => {
                *state.title.lock().unwrap() = call.arg(0)?.clone();
                Ok(Outcome::unit())
            }
            ("Body", Role::Get) => Ok(Outcome::Ready(state.body.lock().unwrap().clone())),
            ("Body", Role::Set) => {
                *state.body.lock().unwrap() = call.arg(0)?.clone();
                Ok(Outcome::unit())
            }
            ("Item", Role::Get) => {
                let page = call.arg(0)?.as_i64().unwrap_or_default();
                let pages = state.pages.lock().unwrap();
                Ok(Outcome::Ready(pages.get(&page).cloned().unwrap_or_default()))
            }
            ("Item", Role::Set) => {
                let page = call.arg(0)?.as_i64().unwrap_or_default();
                let value = call.arg(1)?.clone();
                state.pages.lock().unwrap().insert(page, value);
                Ok(Outcome::unit())
            }
            ("Saved", Role::Add | Role::Remove) => state.saved.apply(&call),
            ("Save", Role::Method) => {
                let raised = state.saved.raise(&[Value::from("Document")])?;
                Ok(Outcome::ready(raised as i64))
            }
            ("WordCount", Role::Method) => {
                let title = state.title.lock().unwrap();
                let words = title.as_str().map(|t| t.split_whitespace().count()).unwrap_or(0);
                Ok(Outcome::ready(words as i64))
            }
            ("TryParse", Role::Method) => {
                let parsed = call.arg(0)?.as_str().and_then(|t| t.parse::<i64>().ok());
                call.set_arg(1, parsed.unwrap_or_default())?;
                Ok(Outcome::ready(parsed.is_some()))
            }
            ("Echo", Role::Method) => Ok(Outcome::Ready(call.arg(0)?.clone())),
            ("Fail", Role::Method) => Err(InterceptError::custom("document failure")),
            ("Version", Role::Method) => Ok(Outcome::ready(1)),
            ("OnPropertyChanged", Role::Method) => {
                let name = call.arg(0)?.to_string();
                state.notifications.lock().unwrap().push(name);
                Ok(Outcome::unit())
            }
            _ => Err(call.unsupported("Document")),
        }
    }
}

fn document_type(state: &Arc<DocumentState>) -> Arc<TypeDescriptor> {
    document_type_with(state, InterceptorManifest::new())
}

fn document_type_with(state: &Arc<DocumentState>, bindings: InterceptorManifest) -> Arc<TypeDescriptor> {
    let state = Arc::clone(state);
    TypeDescriptor::class("Document")
        .implements("IDocument")
        .property(PropertyDescriptor::new("Title", TypeRef::Str).overridable())
        .property(PropertyDescriptor::new("Body", TypeRef::Str).overridable())
        .property(
            PropertyDescriptor::indexer(TypeRef::Str)
                .index("page", TypeRef::Int)
                .overridable(),
        )
        .event(EventDescriptor::new("Saved").overridable())
        .method(MethodDescriptor::new("Save").overridable().returns(TypeRef::Int))
        .method(MethodDescriptor::new("WordCount").overridable().returns(TypeRef::Int))
        .method(
            MethodDescriptor::new("TryParse")
                .overridable()
                .param("text", TypeRef::Str)
                .out_param("result", TypeRef::Int)
                .returns(TypeRef::Bool),
        )
        .method(
            MethodDescriptor::new("Echo")
                .overridable()
                .generic("T")
                .param("value", TypeRef::generic("T"))
                .returns(TypeRef::generic("T")),
        )
        .method(MethodDescriptor::new("Fail").overridable().returns(TypeRef::Str))
        .method(MethodDescriptor::new("Version").returns(TypeRef::Int))
        .method(MethodDescriptor::new("OnPropertyChanged").param("name", TypeRef::Str))
        .bindings(bindings)
        .constructor(move |_| {
            Ok(Arc::new(Document {
                state: Arc::clone(&state),
            }) as Arc<dyn Instance>)
        })
        .build()
}

fn document_interface() -> Arc<TypeDescriptor> {
    TypeDescriptor::interface("IDocument")
        .property(PropertyDescriptor::new("Title", TypeRef::Str))
        .method(MethodDescriptor::new("WordCount").returns(TypeRef::Int))
        .build()
}

/// Interceptor recording `<name>.enter` and `<name>.exit` around proceed
fn tracer(name: &str, log: &Log) -> Arc<dyn Interceptor> {
    let name = name.to_string();
    let log = Arc::clone(log);
    Arc::new(move |invocation: &mut Invocation| -> Result<()> {
        log.lock().unwrap().push(format!("{}.enter", name));
        invocation.proceed()?;
        log.lock().unwrap().push(format!("{}.exit", name));
        Ok(())
    })
}

fn counter(count: &Arc<AtomicUsize>) -> Arc<dyn Interceptor> {
    let count = Arc::clone(count);
    Arc::new(move |invocation: &mut Invocation| -> Result<()> {
        count.fetch_add(1, Ordering::SeqCst);
        invocation.proceed()
    })
}

fn generator() -> ProxyGenerator {
    ProxyGenerator::new(InterceptorFactory::new())
}

// ─── Type Caching ────────────────────────────────────────────────

#[test]
fn test_same_options_share_one_type() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let generator = generator();

    let a = generator.create_class_proxy(&ty, &ProxyOptions::new(), &[]).unwrap();
    let b = generator.create_class_proxy(&ty, &ProxyOptions::new(), &[]).unwrap();

    assert!(Arc::ptr_eq(a.proxy_type(), b.proxy_type()));
    assert_ne!(a.id(), b.id());
    assert_eq!(generator.cached_types(), 1);
}

#[test]
fn test_different_options_get_distinct_types() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let generator = generator();

    let a = generator.create_class_proxy(&ty, &ProxyOptions::new(), &[]).unwrap();
    let b = generator
        .create_class_proxy(
            &ty,
            &ProxyOptions::new().interceptor_order(InterceptorOrder::DeclaredFirst),
            &[],
        )
        .unwrap();
    let c = generator
        .create_class_proxy_with_target(
            &ty,
            Arc::new(Document {
                state: Arc::clone(&state),
            }),
            &ProxyOptions::new(),
            &[],
        )
        .unwrap();

    assert!(!Arc::ptr_eq(a.proxy_type(), b.proxy_type()));
    assert!(!Arc::ptr_eq(a.proxy_type(), c.proxy_type()));
    assert_eq!(c.proxy_type().name(), "ClassProxyWithTarget.Document");
    assert_eq!(generator.cached_types(), 3);
}

#[test]
fn test_instances_keep_their_own_interceptors() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let generator = generator();
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let a = generator
        .create_class_proxy(&ty, &ProxyOptions::new(), &[counter(&first)])
        .unwrap();
    let b = generator
        .create_class_proxy(&ty, &ProxyOptions::new(), &[counter(&second)])
        .unwrap();

    a.call("WordCount", vec![]).unwrap();
    a.call("WordCount", vec![]).unwrap();
    b.call("WordCount", vec![]).unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 2);
    assert_eq!(second.load(Ordering::SeqCst), 1);
}

// ─── Chain Ordering ──────────────────────────────────────────────

#[test]
fn test_onion_ordering() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let log = Arc::clone(&state.log);

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[tracer("A", &log), tracer("B", &log)])
        .unwrap();
    proxy.call("WordCount", vec![]).unwrap();

    assert_eq!(
        entries(&log),
        vec!["A.enter", "B.enter", "callback", "B.exit", "A.exit"]
    );
}

fn tagging_factory(log: &Log) -> InterceptorFactory {
    let log = Arc::clone(log);
    InterceptorFactory::new().with_provider("trace", move |args| {
        let name = args
            .first()
            .and_then(|a| a.as_str())
            .ok_or_else(|| InterceptError::Argument("trace provider needs a name".to_string()))?;
        Ok(tracer(name, &log))
    })
}

fn declared_bindings() -> InterceptorManifest {
    InterceptorManifest::new()
        .intercept_all(vec![ProviderDescriptor::new("trace").with_arg(serde_json::json!("class"))])
        .bind_member(
            "WordCount",
            &[Role::Method],
            vec![ProviderDescriptor::new("trace").with_arg(serde_json::json!("member"))],
        )
}

#[test]
fn test_caller_interceptors_wrap_declared_by_default() {
    let state = Arc::new(DocumentState::default());
    let log = Arc::clone(&state.log);
    let ty = document_type_with(&state, declared_bindings());
    let generator = ProxyGenerator::new(tagging_factory(&log));

    let proxy = generator
        .create_class_proxy(&ty, &ProxyOptions::new(), &[tracer("caller", &log)])
        .unwrap();
    proxy.call("WordCount", vec![]).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "caller.enter",
            "class.enter",
            "member.enter",
            "callback",
            "member.exit",
            "class.exit",
            "caller.exit"
        ]
    );
}

#[test]
fn test_declared_first_puts_caller_innermost() {
    let state = Arc::new(DocumentState::default());
    let log = Arc::clone(&state.log);
    let ty = document_type_with(&state, declared_bindings());
    let generator = ProxyGenerator::new(tagging_factory(&log));

    let options = ProxyOptions::new().interceptor_order(InterceptorOrder::DeclaredFirst);
    let proxy = generator
        .create_class_proxy(&ty, &options, &[tracer("caller", &log)])
        .unwrap();
    proxy.call("WordCount", vec![]).unwrap();

    assert_eq!(
        entries(&log),
        vec![
            "class.enter",
            "member.enter",
            "caller.enter",
            "callback",
            "caller.exit",
            "member.exit",
            "class.exit"
        ]
    );
}

#[test]
fn test_manifest_loaded_from_json() {
    let state = Arc::new(DocumentState::default());
    let log = Arc::clone(&state.log);
    let manifest = InterceptorManifest::from_json(
        r#"{
            "bindings": [
                { "member": "Title", "roles": ["set"], "providers": [{ "provider": "trace", "args": ["setter"] }] }
            ]
        }"#,
    )
    .unwrap();
    let ty = document_type_with(&state, manifest);
    let proxy = ProxyGenerator::new(tagging_factory(&log))
        .create_class_proxy(&ty, &ProxyOptions::new(), &[])
        .unwrap();

    proxy.get("Title").unwrap();
    proxy.set("Title", "Notes").unwrap();

    assert_eq!(
        entries(&log),
        vec!["callback", "setter.enter", "callback", "setter.exit"]
    );
}

// ─── Short-circuit & Mutation ────────────────────────────────────

#[test]
fn test_short_circuit_returns_default() {
    let state = Arc::new(DocumentState::default());
    *state.title.lock().unwrap() = Value::from("two words");
    let ty = document_type(&state);
    let block: Arc<dyn Interceptor> = Arc::new(|_: &mut Invocation| -> Result<()> { Ok(()) });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[block])
        .unwrap();

    assert_eq!(proxy.call("WordCount", vec![]).unwrap(), Value::Int(0));
    assert_eq!(proxy.get("Title").unwrap(), Value::Unit);
    assert!(entries(&state.log).is_empty());
}

#[test]
fn test_interceptor_rewrites_arguments_and_result() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let rewrite: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> Result<()> {
        if invocation.key().role == Role::Set {
            let upper = invocation.argument(0).map(|v| v.to_string().to_uppercase());
            if let Some(upper) = upper {
                invocation.set_argument(0, upper)?;
            }
        }
        invocation.proceed()?;
        if invocation.key().role == Role::Get {
            let decorated = format!("<{}>", invocation.return_value());
            invocation.set_return_value(decorated);
        }
        Ok(())
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[rewrite])
        .unwrap();
    proxy.set("Title", "draft").unwrap();

    assert_eq!(*state.title.lock().unwrap(), Value::from("DRAFT"));
    assert_eq!(proxy.get("Title").unwrap(), Value::from("<DRAFT>"));
}

#[test]
fn test_retry_runs_callback_again() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let twice: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> Result<()> {
        invocation.proceed()?;
        invocation.proceed()
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[twice])
        .unwrap();
    proxy.call("WordCount", vec![]).unwrap();

    assert_eq!(entries(&state.log), vec!["callback", "callback"]);
}

#[test]
fn test_invocation_context() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let inspect: Arc<dyn Interceptor> = Arc::new(move |invocation: &mut Invocation| -> Result<()> {
        assert_eq!(invocation.state(), InvocationState::Running);
        assert!(invocation.target().is_none());
        assert!(invocation.proxy().implements("Document"));
        seen_in.lock().unwrap().push(format!(
            "{}:{}",
            invocation.method().name,
            invocation.member_name()
        ));
        invocation.proceed()
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[inspect])
        .unwrap();
    proxy.set("Title", "x").unwrap();
    proxy.call("WordCount", vec![]).unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["set_Title:Title".to_string(), "WordCount:WordCount".to_string()]
    );
}

// ─── By-ref Parameters ───────────────────────────────────────────

#[test]
fn test_out_parameter_written_back() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[])
        .unwrap();

    let mut args = vec![Value::from("42"), Value::Unit];
    assert_eq!(proxy.call_ref("TryParse", &mut args).unwrap(), Value::Bool(true));
    assert_eq!(args[1], Value::Int(42));

    let mut args = vec![Value::from("nope"), Value::Int(7)];
    assert_eq!(proxy.call_ref("TryParse", &mut args).unwrap(), Value::Bool(false));
    assert_eq!(args[1], Value::Int(0));
}

#[test]
fn test_interceptor_writes_by_ref_slot() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let override_out: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> Result<()> {
        invocation.proceed()?;
        invocation.set_argument(1, 99)?;
        // Plain parameters are not written back
        invocation.set_argument(0, "changed")
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[override_out])
        .unwrap();

    let mut args = vec![Value::from("5"), Value::Unit];
    proxy.call_ref("TryParse", &mut args).unwrap();
    assert_eq!(args, vec![Value::from("5"), Value::Int(99)]);
}

// ─── Clean Properties ────────────────────────────────────────────

#[test]
fn test_redundant_set_suppressed() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let calls = Arc::new(AtomicUsize::new(0));

    let options = ProxyOptions::new().clean_property("Title");
    let proxy = generator()
        .create_class_proxy(&ty, &options, &[counter(&calls)])
        .unwrap();

    proxy.set("Title", "Draft").unwrap();
    proxy.set("Title", "Draft").unwrap();
    assert_eq!(*state.notifications.lock().unwrap(), vec!["Title".to_string()]);

    proxy.set("Title", "Final").unwrap();
    assert_eq!(proxy.get("Title").unwrap(), Value::from("Final"));
    assert_eq!(state.notifications.lock().unwrap().len(), 2);

    // Clean accessors never reach the caller's interceptors
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_clean_and_standard_properties_coexist() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let calls = Arc::new(AtomicUsize::new(0));

    let options = ProxyOptions::new().clean_property("Title");
    let proxy = generator()
        .create_class_proxy(&ty, &options, &[counter(&calls)])
        .unwrap();

    proxy.set("Title", "Draft").unwrap();
    proxy.set("Body", "text").unwrap();
    proxy.get("Body").unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(*state.notifications.lock().unwrap(), vec!["Title".to_string()]);
}

#[test]
fn test_clean_property_from_config() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let config = ProxyConfig::from_json(
        r#"{ "accessorPolicies": { "Body": { "clean": {} } }, "excludedMembers": ["WordCount"] }"#,
    )
    .unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::from_config(config), &[counter(&calls)])
        .unwrap();

    proxy.set("Body", "b").unwrap();
    proxy.call("WordCount", vec![]).unwrap();
    proxy.call("Save", vec![]).unwrap();

    assert_eq!(*state.notifications.lock().unwrap(), vec!["Body".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

// ─── Events & Indexers ───────────────────────────────────────────

#[test]
fn test_event_accessors_are_intercepted() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let log = Arc::clone(&state.log);

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[tracer("event", &log)])
        .unwrap();

    let raised = Arc::new(AtomicUsize::new(0));
    let raised_in = Arc::clone(&raised);
    let handler = Handler::new(move |args| {
        assert_eq!(args[0], Value::from("Document"));
        raised_in.fetch_add(1, Ordering::SeqCst);
    });

    proxy.add_handler("Saved", handler.clone()).unwrap();
    assert_eq!(state.saved.len(), 1);
    assert_eq!(proxy.call("Save", vec![]).unwrap(), Value::Int(1));
    assert_eq!(raised.load(Ordering::SeqCst), 1);

    proxy.remove_handler("Saved", &handler).unwrap();
    assert_eq!(proxy.call("Save", vec![]).unwrap(), Value::Int(0));
    assert_eq!(raised.load(Ordering::SeqCst), 1);

    let enters = entries(&log).iter().filter(|e| *e == "event.enter").count();
    assert_eq!(enters, 4);
}

#[test]
fn test_indexer_carries_index_in_parameters() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_in = Arc::clone(&seen);
    let inspect: Arc<dyn Interceptor> = Arc::new(move |invocation: &mut Invocation| -> Result<()> {
        seen_in.lock().unwrap().push(invocation.parameters().to_vec());
        invocation.proceed()
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[inspect])
        .unwrap();
    proxy.set_indexed("Item", vec![3.into()], "third").unwrap();

    assert_eq!(proxy.get_indexed("Item", vec![3.into()]).unwrap(), Value::from("third"));
    assert_eq!(proxy.get_indexed("Item", vec![4.into()]).unwrap(), Value::Unit);
    assert_eq!(
        seen.lock().unwrap()[0],
        vec![Value::Int(3), Value::from("third")]
    );
}

#[test]
fn test_accessor_method_and_owner_exposed() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let seen: Log = Arc::default();
    let seen_in = Arc::clone(&seen);
    let record: Arc<dyn Interceptor> = Arc::new(move |invocation: &mut Invocation| -> Result<()> {
        seen_in.lock().unwrap().push(format!(
            "{}:{}",
            invocation.method().name,
            invocation.owner().unwrap_or("-")
        ));
        invocation.proceed()
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[record])
        .unwrap();
    proxy.set("Title", "draft").unwrap();
    proxy.get("Title").unwrap();
    proxy.call("Save", vec![]).unwrap();

    assert_eq!(entries(&seen), vec!["set_Title:Title", "get_Title:Title", "Save:-"]);
}

// ─── Generics ────────────────────────────────────────────────────

#[test]
fn test_generic_method_binding() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[])
        .unwrap();

    assert_eq!(
        proxy.call_generic("Echo", &[TypeRef::Int], vec![5.into()]).unwrap(),
        Value::Int(5)
    );
    assert_eq!(
        proxy.call_generic("Echo", &[TypeRef::Str], vec!["hi".into()]).unwrap(),
        Value::from("hi")
    );
    assert!(matches!(
        proxy.call_generic("Echo", &[TypeRef::Int], vec!["hi".into()]),
        Err(InterceptError::ReturnType { .. })
    ));
    assert!(matches!(
        proxy.call("Echo", vec![5.into()]),
        Err(InterceptError::GenericArity { expected: 1, actual: 0, .. })
    ));
}

#[test]
fn test_generic_interface_closed_over_argument() {
    struct Repository;

    impl Instance for Repository {
        fn type_name(&self) -> &str {
            "Repository"
        }

        fn is_a(&self, type_name: &str) -> bool {
            type_name == "IRepository"
        }

        fn invoke(&self, call: Call<'_>) -> Result<Outcome> {
            Ok(Outcome::Ready(call.arg(0)?.clone()))
        }
    }

    let ty = TypeDescriptor::interface("IRepository")
        .generic("T", TypeRef::Int)
        .method(
            MethodDescriptor::new("Find")
                .param("key", TypeRef::generic("T"))
                .returns(TypeRef::generic("T")),
        )
        .build();
    let proxy = generator()
        .create_interface_proxy_with_target(&ty, Arc::new(Repository), &ProxyOptions::new(), &[])
        .unwrap();

    assert_eq!(proxy.proxy_type().name(), "InterfaceProxy.IRepository[int]");
    assert_eq!(proxy.call("Find", vec![7.into()]).unwrap(), Value::Int(7));
    assert!(matches!(
        proxy.call("Find", vec!["seven".into()]),
        Err(InterceptError::ReturnType { .. })
    ));
}

// ─── Selection ───────────────────────────────────────────────────

#[test]
fn test_non_virtual_members_call_through() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let calls = Arc::new(AtomicUsize::new(0));

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[counter(&calls)])
        .unwrap();

    assert_eq!(proxy.call("Version", vec![]).unwrap(), Value::Int(1));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(proxy
        .proxy_type()
        .forwarder(&a3s_intercept::MemberKey::method("Version", 0))
        .unwrap()
        .is_transparent());
}

// ─── Mixins & Targets ────────────────────────────────────────────

struct Clock;

impl Instance for Clock {
    fn type_name(&self) -> &str {
        "Clock"
    }

    fn is_a(&self, type_name: &str) -> bool {
        type_name == "IClock"
    }

    fn invoke(&self, call: Call<'_>) -> Result<Outcome> {
        match call.member.name.as_str() {
            "Now" => Ok(Outcome::ready(1_700_000_000)),
            _ => Err(call.unsupported("Clock")),
        }
    }
}

fn clock_interface() -> Arc<TypeDescriptor> {
    TypeDescriptor::interface("IClock")
        .method(MethodDescriptor::new("Now").returns(TypeRef::Int))
        .build()
}

#[test]
fn test_mixin_woven_into_proxy() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let options = ProxyOptions::new().mixin(Mixin::new(clock_interface(), Arc::new(Clock)));

    let proxy = generator().create_class_proxy(&ty, &options, &[]).unwrap();

    assert!(proxy.implements("IClock"));
    assert!(proxy.implements("IDocument"));
    assert_eq!(proxy.call("Now", vec![]).unwrap(), Value::Int(1_700_000_000));
}

#[test]
fn test_mixin_instance_must_implement_interface() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let options = ProxyOptions::new().mixin(Mixin::new(
        clock_interface(),
        Arc::new(Document {
            state: Arc::clone(&state),
        }),
    ));

    let err = generator().create_class_proxy(&ty, &options, &[]).unwrap_err();
    assert!(matches!(err, InterceptError::Construction { .. }));
}

#[test]
fn test_interface_proxy_forwards_to_target() {
    let state = Arc::new(DocumentState::default());
    *state.title.lock().unwrap() = Value::from("one two three");
    let target = Arc::new(Document {
        state: Arc::clone(&state),
    });

    let proxy = generator()
        .create_interface_proxy_with_target(&document_interface(), target, &ProxyOptions::new(), &[])
        .unwrap();

    assert_eq!(proxy.call("WordCount", vec![]).unwrap(), Value::Int(3));
    assert_eq!(proxy.target().unwrap().type_name(), "Document");
    assert!(matches!(
        proxy.call("Save", vec![]),
        Err(InterceptError::MemberNotFound { .. })
    ));
}

#[test]
fn test_proxy_can_target_another_proxy() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let log = Arc::clone(&state.log);
    let generator = generator();

    let inner = generator
        .create_class_proxy(&ty, &ProxyOptions::new(), &[tracer("inner", &log)])
        .unwrap();
    let outer = generator
        .create_interface_proxy_with_target(
            &document_interface(),
            Arc::new(inner),
            &ProxyOptions::new(),
            &[tracer("outer", &log)],
        )
        .unwrap();

    outer.call("WordCount", vec![]).unwrap();
    assert_eq!(
        entries(&log),
        vec!["outer.enter", "inner.enter", "callback", "inner.exit", "outer.exit"]
    );
}

// ─── Errors ──────────────────────────────────────────────────────

struct Stranger;

impl Instance for Stranger {
    fn type_name(&self) -> &str {
        "Stranger"
    }

    fn invoke(&self, call: Call<'_>) -> Result<Outcome> {
        Err(call.unsupported("Stranger"))
    }
}

#[test]
fn test_target_must_implement_interface() {
    let err = generator()
        .create_interface_proxy_with_target(
            &document_interface(),
            Arc::new(Stranger),
            &ProxyOptions::new(),
            &[],
        )
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "The target 'Stranger' doesn't implement 'IDocument'"
    );
}

#[test]
fn test_class_without_constructor_rejected() {
    let ty = TypeDescriptor::class("Abstract")
        .method(MethodDescriptor::new("Run").abstract_member())
        .build();
    assert!(matches!(
        generator().create_class_proxy(&ty, &ProxyOptions::new(), &[]),
        Err(InterceptError::NoConstructor(_))
    ));
}

#[test]
fn test_callback_error_propagates() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let log = Arc::clone(&state.log);

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[tracer("A", &log)])
        .unwrap();
    let err = proxy.call("Fail", vec![]).unwrap_err();

    assert_eq!(err.to_string(), "document failure");
    // The tracer's exit never ran
    assert_eq!(entries(&log), vec!["A.enter", "callback"]);
}

#[test]
fn test_outer_interceptor_recovers_error() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let recover: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> Result<()> {
        if invocation.proceed().is_err() {
            invocation.set_return_value("recovered");
        }
        Ok(())
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[recover])
        .unwrap();
    assert_eq!(proxy.call("Fail", vec![]).unwrap(), Value::from("recovered"));
}

#[test]
fn test_return_value_cast_checked() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let wrong: Arc<dyn Interceptor> = Arc::new(|invocation: &mut Invocation| -> Result<()> {
        invocation.proceed()?;
        invocation.set_return_value("not a number");
        Ok(())
    });

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[wrong])
        .unwrap();
    assert!(matches!(
        proxy.call("WordCount", vec![]),
        Err(InterceptError::ReturnType { .. })
    ));
}

#[test]
fn test_unknown_member_and_arity() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[])
        .unwrap();

    assert!(matches!(
        proxy.call("Publish", vec![]),
        Err(InterceptError::MemberNotFound { .. })
    ));
    assert!(matches!(
        proxy.call("WordCount", vec![1.into()]),
        Err(InterceptError::Arity { expected: 0, actual: 1, .. })
    ));
}

// ─── Overloads & Source Identity ─────────────────────────────────

struct Writer {
    log: Log,
}

impl Instance for Writer {
    fn type_name(&self) -> &str {
        "Writer"
    }

    fn is_a(&self, type_name: &str) -> bool {
        type_name == "IWriter"
    }

    fn invoke(&self, call: Call<'_>) -> Result<Outcome> {
        let signature = call.member.describe();
        self.log.lock().unwrap().push(signature.clone());
        match call.member.name.as_str() {
            "Write" | "A" | "B" => Ok(Outcome::ready(signature)),
            "Ratio" => Ok(Outcome::ready(3)),
            _ => Err(call.unsupported("Writer")),
        }
    }
}

fn writer(log: &Log) -> Arc<Writer> {
    Arc::new(Writer {
        log: Arc::clone(log),
    })
}

#[test]
fn test_same_arity_overloads_dispatch_by_argument_type() {
    let log: Log = Arc::default();
    let ty = TypeDescriptor::interface("IWriter")
        .method(MethodDescriptor::new("Write").param("s", TypeRef::Str).returns(TypeRef::Str))
        .method(MethodDescriptor::new("Write").param("i", TypeRef::Int).returns(TypeRef::Str))
        .build();
    let seen = Arc::clone(&log);
    let observe: Arc<dyn Interceptor> = Arc::new(move |invocation: &mut Invocation| -> Result<()> {
        seen.lock()
            .unwrap()
            .push(format!("intercept:{}", invocation.key().describe()));
        invocation.proceed()
    });

    let proxy = generator()
        .create_interface_proxy_with_target(&ty, writer(&log), &ProxyOptions::new(), &[observe])
        .unwrap();

    assert_eq!(proxy.call("Write", vec!["text".into()]).unwrap(), Value::from("Write(str)"));
    assert_eq!(proxy.call("Write", vec![5.into()]).unwrap(), Value::from("Write(int)"));
    assert_eq!(
        entries(&log),
        vec!["intercept:Write(str)", "Write(str)", "intercept:Write(int)", "Write(int)"]
    );
    assert!(matches!(
        proxy.call("Write", vec![true.into()]),
        Err(InterceptError::Argument(_))
    ));
}

#[test]
fn test_same_name_different_shape_gets_own_type() {
    let log: Log = Arc::default();
    let declaring = |member: &str| {
        TypeDescriptor::interface("IWriter")
            .method(MethodDescriptor::new(member).param("x", TypeRef::Int).returns(TypeRef::Str))
            .build()
    };
    let generator = generator();

    let first = generator
        .create_interface_proxy_with_target(&declaring("A"), writer(&log), &ProxyOptions::new(), &[])
        .unwrap();
    let second = generator
        .create_interface_proxy_with_target(&declaring("B"), writer(&log), &ProxyOptions::new(), &[])
        .unwrap();

    assert_eq!(first.proxy_type().name(), second.proxy_type().name());
    assert!(!Arc::ptr_eq(first.proxy_type(), second.proxy_type()));
    assert_eq!(second.call("B", vec![1.into()]).unwrap(), Value::from("B(int)"));
    assert_eq!(first.call("A", vec![1.into()]).unwrap(), Value::from("A(int)"));
    assert_eq!(generator.cached_types(), 2);
}

#[test]
fn test_equal_shapes_share_type_with_own_constructor() {
    let first = Arc::new(DocumentState::default());
    let second = Arc::new(DocumentState::default());
    let generator = generator();

    let a = generator
        .create_class_proxy(&document_type(&first), &ProxyOptions::new(), &[])
        .unwrap();
    let b = generator
        .create_class_proxy(&document_type(&second), &ProxyOptions::new(), &[])
        .unwrap();
    assert!(Arc::ptr_eq(a.proxy_type(), b.proxy_type()));

    b.set("Title", "second").unwrap();
    assert_eq!(*second.title.lock().unwrap(), Value::from("second"));
    assert_eq!(*first.title.lock().unwrap(), Value::Unit);
}

#[test]
fn test_int_result_cast_to_declared_float() {
    let log: Log = Arc::default();
    let ty = TypeDescriptor::interface("IWriter")
        .method(MethodDescriptor::new("Ratio").returns(TypeRef::Float))
        .build();

    let proxy = generator()
        .create_interface_proxy_with_target(&ty, writer(&log), &ProxyOptions::new(), &[])
        .unwrap();
    assert_eq!(proxy.call("Ratio", vec![]).unwrap(), Value::Float(3.0));
}

// ─── Lifecycle ───────────────────────────────────────────────────

struct Audit {
    log: Log,
}

impl LifecycleInterceptor for Audit {
    fn on_enter(&self, invocation: &mut Invocation) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .push(format!("enter:{}", invocation.member_name()));
        Ok(())
    }

    fn on_exit(&self, member: &str, return_value: &Value) {
        self.log
            .lock()
            .unwrap()
            .push(format!("exit:{}={}", member, return_value));
    }

    fn on_exception(&self, member: &str, error: &InterceptError) {
        self.log
            .lock()
            .unwrap()
            .push(format!("error:{}={}", member, error));
    }
}

#[test]
fn test_lifecycle_interceptor() {
    let state = Arc::new(DocumentState::default());
    *state.title.lock().unwrap() = Value::from("hello world");
    let ty = document_type(&state);
    let log = Arc::clone(&state.log);
    let audit: Arc<dyn Interceptor> = Arc::new(Lifecycle::new(Audit {
        log: Arc::clone(&log),
    }));

    let proxy = generator()
        .create_class_proxy(&ty, &ProxyOptions::new(), &[audit])
        .unwrap();
    proxy.call("WordCount", vec![]).unwrap();
    let _ = proxy.call("Fail", vec![]);

    assert_eq!(
        entries(&log),
        vec![
            "enter:WordCount",
            "callback",
            "exit:WordCount=2",
            "enter:Fail",
            "callback",
            "error:Fail=document failure"
        ]
    );
}

// ─── Concurrency ─────────────────────────────────────────────────

struct CountingBackend {
    inner: DispatchBackend,
    builds: Arc<AtomicUsize>,
}

impl ProxyBackend for CountingBackend {
    fn synthesize(&self, plan: &BuildPlan, factory: &InterceptorFactory) -> Result<ProxyType> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(25));
        self.inner.synthesize(plan, factory)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[test]
fn test_concurrent_first_requests_synthesize_once() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type(&state);
    let builds = Arc::new(AtomicUsize::new(0));
    let generator = Arc::new(ProxyGenerator::with_backend(
        CountingBackend {
            inner: DispatchBackend::new(),
            builds: Arc::clone(&builds),
        },
        InterceptorFactory::new(),
    ));
    let mut rx = generator.subscribe();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let generator = Arc::clone(&generator);
            let ty = Arc::clone(&ty);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let proxy = generator
                    .create_class_proxy(&ty, &ProxyOptions::new(), &[])
                    .unwrap();
                Arc::clone(proxy.proxy_type())
            })
        })
        .collect();

    let types: Vec<Arc<ProxyType>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert!(types.iter().all(|t| Arc::ptr_eq(t, &types[0])));

    let mut synthesized = 0;
    let mut created = 0;
    while let Ok(event) = rx.try_recv() {
        created += 1;
        if event.synthesized {
            synthesized += 1;
        }
    }
    assert_eq!(created, 8);
    assert_eq!(synthesized, 1);
}

#[test]
fn test_failed_synthesis_is_not_cached() {
    let state = Arc::new(DocumentState::default());
    let ty = document_type_with(
        &state,
        InterceptorManifest::new().intercept_all(vec![ProviderDescriptor::new("late")]),
    );
    let generator = generator();

    assert!(matches!(
        generator.create_class_proxy(&ty, &ProxyOptions::new(), &[]),
        Err(InterceptError::UnknownProvider(_))
    ));
    assert_eq!(generator.cached_types(), 0);
}
