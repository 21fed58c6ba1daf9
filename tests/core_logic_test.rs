use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use testscope::core::config::{ConfigurationSource, keys};
use testscope::{
    ConfigurationError, ConfigurationLoader, ConfigurationParameters, ConfigurationStore, DiscoveryEngine,
    DiscoveryUnit, Filter, FilterType, select,
};

fn setup_project() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let classes = dir.path().join("classes").join("org").join("example");
    fs::create_dir_all(&classes).unwrap();
    for name in ["AlphaTest", "BetaTest", "GammaIT"] {
        fs::write(classes.join(format!("{name}.class")), b"\xCA\xFE\xBA\xBE").unwrap();
    }
    dir
}

#[test]
fn test_core_workflow() {
    let td = setup_project();
    let root = td.path();

    // 1. Setup config
    let properties = root.join("custom.properties");
    fs::write(
        &properties,
        format!(
            "{}={}\n{}=conf/filters.yaml\nrun.parallel=true\n",
            keys::CLASSPATH,
            root.join("classes").display(),
            keys::FILTER_DEFINITIONS_FILENAME
        ),
    )
    .unwrap();

    // 2. Filters relative to the properties file
    fs::create_dir_all(root.join("conf")).unwrap();
    fs::write(
        root.join("conf").join("filters.yaml"),
        "- type: ExcludeClass\n  enabled: true\n  classRegex: \"IT$\"\n",
    )
    .unwrap();

    // 3. Load through the override path
    let store = ConfigurationLoader::new(root)
        .with_override(&properties)
        .load()
        .unwrap();
    let parameters = ConfigurationParameters::new(&store);
    assert_eq!(parameters.get_bool("run.parallel").unwrap(), Some(true));

    // 4. Run the pipeline
    let engine = DiscoveryEngine::from_store(Arc::new(store)).unwrap();
    let selection = engine.resolve_working_set(|_| true).unwrap();

    assert_eq!(selection.discovery.len(), 3);
    assert_eq!(selection.filters[0].filter_type(), FilterType::ExcludeClass);
    assert_eq!(
        selection.working_set.class_names(),
        vec!["org.example.AlphaTest", "org.example.BetaTest"]
    );
    assert!(selection.failures.is_empty());
}

#[test]
fn test_missing_override_is_a_load_error() {
    let td = tempfile::tempdir().unwrap();
    let result = ConfigurationLoader::new(td.path())
        .with_override(td.path().join("absent.properties"))
        .load();
    assert!(matches!(result, Err(ConfigurationError::Load { .. })));
}

#[test]
fn test_filter_order_from_public_api() {
    let discovery = vec![DiscoveryUnit::new("Foo1"), DiscoveryUnit::new("Bar1")];

    let filters = [
        Filter::exclude_class(".*", None).unwrap(),
        Filter::include_class("Foo.*", None).unwrap(),
    ];
    assert_eq!(select(&discovery, &filters).class_names(), vec!["Foo1"]);

    let reversed = [
        Filter::include_class("Foo.*", None).unwrap(),
        Filter::exclude_class(".*", None).unwrap(),
    ];
    assert!(select(&discovery, &reversed).is_empty());
}

#[test]
fn test_store_shared_across_threads() {
    let store = Arc::new(ConfigurationStore::new());

    thread::scope(|scope| {
        for worker in 0..8 {
            let store = Arc::clone(&store);
            scope.spawn(move || {
                for i in 0..100 {
                    store.put(&format!("worker.{worker}.{i}"), i.to_string()).unwrap();
                    store.compute_if_absent("shared", |_| Some(format!("from {worker}"))).unwrap();
                    let _ = store.snapshot();
                }
            });
        }
    });

    assert_eq!(store.size(), 8 * 100 + 1);
    assert!(store.get("shared").unwrap().unwrap().starts_with("from "));
}

#[test]
fn test_blank_arguments_are_rejected() {
    let store = ConfigurationStore::new();
    assert!(matches!(store.put("  ", "x"), Err(ConfigurationError::InvalidArgument(_))));
    assert!(matches!(store.get(""), Err(ConfigurationError::InvalidArgument(_))));
    assert!(store.is_empty());
}
