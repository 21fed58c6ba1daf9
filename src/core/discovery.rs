use crate::core::classpath::ResourceLocator;
use serde::Serialize;
use std::collections::BTreeSet;

/// A candidate test class found on the classpath.
///
/// The filter engine only looks at the fully-qualified name, the declared tags
/// and the method names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryUnit {
    name: String,
    tags: BTreeSet<String>,
    methods: BTreeSet<String>,
}

impl DiscoveryUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: BTreeSet::new(),
            methods: BTreeSet::new(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.methods.extend(methods.into_iter().map(Into::into));
        self
    }

    /// Fully-qualified, dot-separated class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn methods(&self) -> &BTreeSet<String> {
        &self.methods
    }

    /// The package part of the name, empty for the default package.
    pub fn package(&self) -> &str {
        self.name.rsplit_once('.').map_or("", |(package, _)| package)
    }
}

/// Turns a class entry found on the classpath into a [`DiscoveryUnit`].
///
/// This is the seam where a platform-specific inspection mechanism plugs in;
/// nothing downstream assumes how tags and methods were obtained.
pub trait ClassInspector: Send + Sync {
    /// Returns `None` to leave the entry out of discovery.
    fn inspect(&self, class_name: &str, locator: &ResourceLocator) -> Option<DiscoveryUnit>;
}

/// Inspector that knows only the class name.
#[derive(Debug, Default, Clone, Copy)]
pub struct NameInspector;

impl ClassInspector for NameInspector {
    fn inspect(&self, class_name: &str, _locator: &ResourceLocator) -> Option<DiscoveryUnit> {
        Some(DiscoveryUnit::new(class_name))
    }
}

const CLASS_SUFFIX: &str = ".class";

/// Derives a class name from a root-relative, `/`-separated entry name.
///
/// `com/acme/FooTest.class` becomes `com.acme.FooTest`. Module and package
/// descriptors and anything under `META-INF/` are not classes.
pub fn class_name_for_entry(entry: &str) -> Option<String> {
    let stem = entry.strip_suffix(CLASS_SUFFIX)?;
    if stem.is_empty() || stem.starts_with("META-INF/") {
        return None;
    }

    let simple = stem.rsplit('/').next().unwrap_or(stem);
    if simple.is_empty() || simple == "module-info" || simple == "package-info" {
        return None;
    }

    Some(stem.replace('/', "."))
}
