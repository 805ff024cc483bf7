use bean_registry::{instance, same_instance, Config, InstantiateErrorKind, RegistryErrorKind, SingletonRegistry};
use parking_lot::Mutex;
use std::{
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};
use tracing_test::traced_test;

#[derive(Debug, PartialEq)]
struct TestBean(&'static str);

fn record(registry: &SingletonRegistry, destroyed: &Arc<Mutex<Vec<String>>>, names: &[&str]) {
    for name in names {
        let destroyed = destroyed.clone();
        let name_owned = (*name).to_owned();
        registry.register_disposable_bean(name, move || {
            destroyed.lock().push(name_owned.clone());
            anyhow::Ok(())
        });
    }
}

fn position(destroyed: &[String], name: &str) -> usize {
    destroyed
        .iter()
        .position(|destroyed| destroyed == name)
        .unwrap_or_else(|| panic!("'{name}' wasn't destroyed"))
}

#[test]
#[traced_test]
fn test_singletons() {
    let registry = SingletonRegistry::new();
    let tb = instance(TestBean("tb"));
    registry.register_singleton("tb", tb.clone()).unwrap();

    let tb2 = registry
        .get_or_create_singleton("tb2", || Ok(instance(TestBean("tb2"))))
        .unwrap();

    assert!(same_instance(&registry.get_singleton("tb").unwrap(), &tb));
    assert!(same_instance(&registry.get_singleton("tb2").unwrap(), &tb2));
    assert_eq!(*registry.get_singleton_as::<TestBean>("tb2").unwrap(), TestBean("tb2"));
    assert_eq!(registry.singleton_count(), 2);
    assert_eq!(registry.singleton_names(), ["tb", "tb2"]);

    registry.destroy_singletons();

    assert_eq!(registry.singleton_count(), 0);
    assert!(registry.singleton_names().is_empty());
    assert!(registry.get_singleton("tb").is_none());
}

#[test]
#[traced_test]
fn test_disposable_bean() {
    let registry = SingletonRegistry::new();
    let destroy_count = Arc::new(AtomicU8::new(0));
    registry.register_singleton("tb", instance(TestBean("tb"))).unwrap();
    registry.register_disposable_bean("tb", {
        let destroy_count = destroy_count.clone();
        move || {
            destroy_count.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(())
        }
    });

    assert!(registry.contains_singleton("tb"));
    assert_eq!(registry.singleton_count(), 1);
    assert_eq!(registry.singleton_names(), ["tb"]);

    registry.destroy_singletons();

    assert_eq!(destroy_count.load(Ordering::SeqCst), 1);
    assert!(!registry.contains_singleton("tb"));
    assert_eq!(registry.singleton_count(), 0);
    assert!(registry.singleton_names().is_empty());

    registry.destroy_singletons();
    assert_eq!(destroy_count.load(Ordering::SeqCst), 1);
}

#[test]
#[traced_test]
fn test_dependent_registration() {
    let registry = SingletonRegistry::new();
    registry.register_dependent_bean("a", "b");
    registry.register_dependent_bean("b", "c");
    registry.register_dependent_bean("c", "b");

    assert!(registry.is_dependent("a", "b"));
    assert!(registry.is_dependent("b", "c"));
    assert!(registry.is_dependent("c", "b"));
    assert!(registry.is_dependent("a", "c"));
    assert!(!registry.is_dependent("c", "a"));
    assert!(!registry.is_dependent("b", "a"));
    assert!(!registry.is_dependent("a", "a"));
    assert!(registry.is_dependent("b", "b"));
    assert!(registry.is_dependent("c", "c"));
}

#[test]
#[traced_test]
fn test_destroy_dependent_beans() {
    let registry = SingletonRegistry::new();
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    registry.register_dependent_bean("A", "B");
    registry.register_dependent_bean("B", "C");
    registry.register_dependent_bean("C", "D");
    registry.register_dependent_bean("C", "F");
    registry.register_dependent_bean("E", "G");
    registry.register_dependent_bean("C", "G");
    record(&registry, &destroyed, &["G", "F", "E", "D", "C", "B", "A"]);

    assert_eq!(registry.dependencies_for_bean("C"), ["B"]);
    assert_eq!(registry.dependencies_for_bean("D"), ["C"]);
    assert_eq!(registry.dependent_beans("C"), ["D", "F", "G"]);

    registry.destroy_singletons();

    let destroyed = destroyed.lock();
    assert_eq!(destroyed.len(), 7);
    for dependent in ["D", "F", "G"] {
        assert!(position(&destroyed, dependent) < position(&destroyed, "C"));
    }
    assert!(position(&destroyed, "C") < position(&destroyed, "B"));
    assert!(position(&destroyed, "B") < position(&destroyed, "A"));
    assert!(position(&destroyed, "G") < position(&destroyed, "E"));
    assert!(registry.dependency_graph().is_empty());
}

#[test]
#[traced_test]
fn test_destroy_circular_dependencies() {
    let registry = SingletonRegistry::new();
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    registry.register_dependent_bean("A", "B");
    registry.register_dependent_bean("B", "C");
    registry.register_dependent_bean("C", "D");
    registry.register_dependent_bean("D", "A");
    record(&registry, &destroyed, &["A", "B", "C", "D"]);

    registry.destroy_singletons();

    let mut destroyed = destroyed.lock().clone();
    destroyed.sort();
    assert_eq!(destroyed, ["A", "B", "C", "D"]);
    assert!(registry.dependency_graph().is_empty());
}

#[test]
#[traced_test]
fn test_destroy_contained_beans_once() {
    let registry = SingletonRegistry::new();
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    registry.register_contained_bean("A", "B");
    registry.register_contained_bean("B", "C");
    registry.register_contained_bean("C", "D");
    registry.register_contained_bean("D", "E");
    registry.register_contained_bean("F", "E");
    record(&registry, &destroyed, &["A", "B", "C", "D", "E", "F"]);

    registry.destroy_singleton("E");

    let destroyed = destroyed.lock().clone();
    let mut sorted = destroyed.clone();
    sorted.sort();
    assert_eq!(sorted, ["A", "B", "C", "D", "E", "F"]);
    assert_eq!(destroyed[0], "E");
    assert!(position(&destroyed, "D") < position(&destroyed, "C"));
    assert!(position(&destroyed, "B") < position(&destroyed, "A"));
    assert!(registry.contained_beans("E").is_empty());
}

#[test]
#[traced_test]
fn test_destroy_singleton_keeps_unrelated() {
    let registry = SingletonRegistry::new();
    let destroyed = Arc::new(Mutex::new(Vec::new()));
    registry.register_singleton("a", instance(TestBean("a"))).unwrap();
    registry.register_singleton("b", instance(TestBean("b"))).unwrap();
    record(&registry, &destroyed, &["a", "b"]);

    registry.destroy_singleton("a");

    assert_eq!(*destroyed.lock(), ["a"]);
    assert!(!registry.contains_singleton("a"));
    assert!(registry.contains_singleton("b"));
    assert_eq!(registry.singleton_names(), ["b"]);
}

#[test]
#[traced_test]
fn test_circular_creation_with_early_reference() {
    #[allow(dead_code)]
    struct A(Arc<B>);
    struct B(bean_registry::Instance);

    let registry = SingletonRegistry::new();
    let a = registry
        .get_or_create_singleton("a", || {
            let raw = instance(());
            registry.add_singleton_factory("a", {
                let raw = raw.clone();
                move || raw
            });
            let b = registry.get_or_create_singleton("b", || {
                let early_a = registry
                    .get_singleton("a")
                    .ok_or_else(|| anyhow::anyhow!("no early reference to 'a'"))?;
                Ok(instance(B(early_a)))
            })?;
            let b = bean_registry::downcast::<B>(b).ok_or_else(|| anyhow::anyhow!("'b' isn't a B"))?;
            assert!(same_instance(&b.0, &raw));
            Ok(instance(A(b)))
        })
        .unwrap();

    assert!(registry.get_singleton_as::<A>("a").is_some());
    assert!(same_instance(&registry.get_singleton("a").unwrap(), &a));
    assert!(!registry.is_currently_in_creation("a"));
    assert!(!registry.is_currently_in_creation("b"));
}

#[test]
#[traced_test]
fn test_unresolvable_cycle() {
    let registry = SingletonRegistry::new();

    let err = registry
        .get_or_create_singleton("a", || {
            registry.get_or_create_singleton("b", || {
                registry.get_or_create_singleton("a", || Ok(instance(())))?;
                Ok(instance(()))
            })?;
            Ok(instance(()))
        })
        .unwrap_err();

    assert!(matches!(err, RegistryErrorKind::CreationFailed { ref name, .. } if name == "a"));
    assert!(matches!(err.root_cause(), RegistryErrorKind::CurrentlyInCreation { name } if name == "a"));
    assert_eq!(registry.singleton_count(), 0);

    assert!(registry.get_or_create_singleton("a", || Ok(instance(()))).is_ok());
}

#[test]
#[traced_test]
fn test_failed_creation_with_suppressed_errors() {
    let registry = SingletonRegistry::new_with_config(Config {
        suppressed_errors_limit: 2,
        ..Config::default()
    });

    let result = registry.get_or_create_singleton("a", || {
        for i in 0..3 {
            registry.on_suppressed_error(anyhow::anyhow!("attempt {i} failed"));
        }
        Err(InstantiateErrorKind::Custom(anyhow::anyhow!("no connection")))
    });

    let Err(RegistryErrorKind::CreationFailed { name, source, suppressed }) = result else {
        panic!("creation should fail");
    };
    assert_eq!(name, "a");
    assert_eq!(source.to_string(), "no connection");
    assert_eq!(suppressed.len(), 2);
    assert!(!registry.contains_singleton("a"));
}

#[test]
#[traced_test]
fn test_concurrent_get_or_create() {
    let registry = Arc::new(SingletonRegistry::new());
    let call_count = Arc::new(AtomicU8::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles = (0..8)
        .map(|_| {
            let registry = registry.clone();
            let call_count = call_count.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                registry
                    .get_or_create_singleton("shared", || {
                        call_count.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(10));
                        Ok(instance(TestBean("shared")))
                    })
                    .unwrap()
            })
        })
        .collect::<Vec<_>>();
    let instances = handles.into_iter().map(|handle| handle.join().unwrap()).collect::<Vec<_>>();

    assert_eq!(call_count.load(Ordering::SeqCst), 1);
    assert!(instances.windows(2).all(|pair| same_instance(&pair[0], &pair[1])));
    assert_eq!(registry.singleton_count(), 1);
}

#[test]
#[traced_test]
fn test_dependencies_keyed_by_alias_target() {
    let registry = SingletonRegistry::new();
    registry.aliases().register_alias("datasource", "db").unwrap();
    registry.register_dependent_bean("db", "repository");

    assert_eq!(registry.dependent_beans("datasource"), ["repository"]);
    assert_eq!(registry.dependencies_for_bean("repository"), ["datasource"]);
    assert!(registry.is_dependent("db", "repository"));
    assert!(registry.has_dependent_bean("datasource"));
}
