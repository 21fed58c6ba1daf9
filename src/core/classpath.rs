use crate::core::discovery::{ClassInspector, DiscoveryUnit, NameInspector, class_name_for_entry};
use crate::core::error::{ConfigurationError, Result, ScanError, require_non_empty};
use regex::Regex;
use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, trace, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

/// Environment variable holding the platform classpath listing.
pub const CLASSPATH_ENV: &str = "CLASSPATH";

static GLOBAL: OnceLock<ClasspathScanner> = OnceLock::new();

/// Capability interface for finding classes and resources.
///
/// Keeps the filter and configuration logic independent of how the classpath
/// is actually inspected.
pub trait ClassFinder: Send + Sync {
    /// The roots searched by the other operations, in listing order.
    fn classpath_roots(&self) -> &[ClasspathRoot];

    /// Every class on the classpath accepted by `predicate`, de-duplicated by name.
    fn find_classes(&self, predicate: &dyn Fn(&DiscoveryUnit) -> bool) -> ScanReport<DiscoveryUnit>;

    /// Every resource whose name fully matches `pattern`.
    fn find_resources(&self, pattern: &str) -> Result<ScanReport<ResourceLocator>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Directory,
    Archive,
    /// Neither a directory nor an archive. Skipped by scans.
    Other,
}

/// One directory or archive contributing classes and resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClasspathRoot {
    path: PathBuf,
}

impl ClasspathRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checked against the filesystem on every call.
    pub fn kind(&self) -> RootKind {
        if self.path.is_dir() {
            RootKind::Directory
        } else if is_archive(&self.path) {
            RootKind::Archive
        } else {
            RootKind::Other
        }
    }

    pub fn uri(&self) -> String {
        let mut uri = format!("file://{}", self.path.display());
        if self.path.is_dir() && !uri.ends_with('/') {
            uri.push('/');
        }
        uri
    }
}

impl fmt::Display for ClasspathRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jar") || ext.eq_ignore_ascii_case("zip"))
}

/// Where a resource lives: a plain file or an entry inside an archive.
///
/// Both variants are read through [`open`](Self::open).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceLocator {
    File(PathBuf),
    ArchiveEntry { archive: PathBuf, entry: String },
}

impl ResourceLocator {
    pub fn open(&self) -> io::Result<Box<dyn Read>> {
        match self {
            ResourceLocator::File(path) => Ok(Box::new(BufReader::new(File::open(path)?))),
            ResourceLocator::ArchiveEntry { archive, entry } => {
                let mut zip = ZipArchive::new(File::open(archive)?).map_err(io::Error::other)?;
                let mut file = zip.by_name(entry).map_err(io::Error::other)?;
                let mut buffer = Vec::new();
                file.read_to_end(&mut buffer)?;
                Ok(Box::new(io::Cursor::new(buffer)))
            }
        }
    }

    pub fn read_to_string(&self) -> io::Result<String> {
        let mut content = String::new();
        self.open()?.read_to_string(&mut content)?;
        Ok(content)
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceLocator::File(path) => write!(f, "file://{}", path.display()),
            ResourceLocator::ArchiveEntry { archive, entry } => {
                write!(f, "jar:file://{}!/{}", archive.display(), entry)
            }
        }
    }
}

/// Result of a scan over every classpath root.
///
/// A root that cannot be read lands in `failures` while the other roots are
/// still scanned. Unreadable entries inside a root are skipped silently.
#[derive(Debug)]
pub struct ScanReport<T> {
    pub items: Vec<T>,
    pub failures: Vec<ScanError>,
}

impl<T> Default for ScanReport<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> ScanReport<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The items, or the first root failure.
    pub fn into_result(self) -> std::result::Result<Vec<T>, ScanError> {
        match self.failures.into_iter().next() {
            Some(failure) => Err(failure),
            None => Ok(self.items),
        }
    }
}

/// A file inside a root.
struct RootEntry {
    /// Root-relative, `/`-separated.
    name: String,
    file_name: String,
    locator: ResourceLocator,
}

/// Enumerates classes and resources across the classpath roots.
pub struct ClasspathScanner {
    listing: OsString,
    roots: OnceLock<Vec<ClasspathRoot>>,
    inspector: Box<dyn ClassInspector>,
}

impl ClasspathScanner {
    /// A scanner over a path-separator-delimited listing of directories and archives.
    pub fn new(listing: impl Into<OsString>) -> Self {
        Self {
            listing: listing.into(),
            roots: OnceLock::new(),
            inspector: Box::new(NameInspector),
        }
    }

    /// A scanner over the `CLASSPATH` environment variable.
    pub fn from_env() -> Self {
        Self::new(std::env::var_os(CLASSPATH_ENV).unwrap_or_default())
    }

    /// The process-wide scanner over `CLASSPATH`.
    ///
    /// Its roots are parsed once and shared by every engine that falls back
    /// to the environment.
    pub fn global() -> &'static ClasspathScanner {
        GLOBAL.get_or_init(Self::from_env)
    }

    pub fn with_inspector(mut self, inspector: impl ClassInspector + 'static) -> Self {
        self.inspector = Box::new(inspector);
        self
    }

    /// The de-duplicated roots, in listing order.
    ///
    /// Computed on first call with initialization serialized across threads;
    /// later calls read the cached list without locking. Changes to the listing
    /// source after that point are not picked up.
    pub fn classpath_roots(&self) -> &[ClasspathRoot] {
        self.roots.get_or_init(|| parse_listing(&self.listing))
    }

    pub fn find_classes<P>(&self, predicate: P) -> ScanReport<DiscoveryUnit>
    where
        P: Fn(&DiscoveryUnit) -> bool,
    {
        let mut report = ScanReport::default();
        let mut seen = HashSet::new();

        for root in self.classpath_roots() {
            match self.classes_in_root(root, &predicate) {
                Ok(units) => {
                    for unit in units {
                        if seen.insert(unit.name().to_string()) {
                            report.items.push(unit);
                        }
                    }
                }
                Err(failure) => {
                    warn!("skipping classpath root [{}]: {failure}", root.path().display());
                    report.failures.push(failure);
                }
            }
        }

        report
    }

    /// Classes in a single root. The root does not have to be on the classpath.
    pub fn find_classes_in_root<P>(
        &self,
        root: &ClasspathRoot,
        predicate: P,
    ) -> std::result::Result<Vec<DiscoveryUnit>, ScanError>
    where
        P: Fn(&DiscoveryUnit) -> bool,
    {
        self.classes_in_root(root, &predicate)
    }

    /// Classes in `package` or any of its sub-packages, across every root.
    pub fn find_classes_in_package<P>(
        &self,
        package: &str,
        predicate: P,
    ) -> Result<ScanReport<DiscoveryUnit>>
    where
        P: Fn(&DiscoveryUnit) -> bool,
    {
        let package = require_non_empty(package, "packageName")?;
        let prefix = format!("{package}.");
        Ok(self.find_classes(|unit| unit.name().starts_with(&prefix) && predicate(unit)))
    }

    /// Resources whose name fully matches `pattern`.
    ///
    /// In a directory root the pattern is matched against the bare file name;
    /// in an archive root against the full entry name.
    pub fn find_resources(&self, pattern: &str) -> Result<ScanReport<ResourceLocator>> {
        let pattern = require_non_empty(pattern, "regex")?;
        let regex = full_match_regex(pattern)?;
        let mut report = ScanReport::default();

        for root in self.classpath_roots() {
            let kind = root.kind();
            match root_entries(root) {
                Ok(entries) => report.items.extend(entries.into_iter().filter_map(|entry| {
                    let target = match kind {
                        RootKind::Archive => &entry.name,
                        _ => &entry.file_name,
                    };
                    regex.is_match(target).then_some(entry.locator)
                })),
                Err(failure) => {
                    warn!("skipping classpath root [{}]: {failure}", root.path().display());
                    report.failures.push(failure);
                }
            }
        }

        Ok(report)
    }

    fn classes_in_root(
        &self,
        root: &ClasspathRoot,
        predicate: &dyn Fn(&DiscoveryUnit) -> bool,
    ) -> std::result::Result<Vec<DiscoveryUnit>, ScanError> {
        let entries = root_entries(root)?;
        Ok(entries
            .iter()
            .filter_map(|entry| {
                let class_name = class_name_for_entry(&entry.name)?;
                self.inspector.inspect(&class_name, &entry.locator)
            })
            .filter(|unit| predicate(unit))
            .collect())
    }
}

impl ClassFinder for ClasspathScanner {
    fn classpath_roots(&self) -> &[ClasspathRoot] {
        ClasspathScanner::classpath_roots(self)
    }

    fn find_classes(&self, predicate: &dyn Fn(&DiscoveryUnit) -> bool) -> ScanReport<DiscoveryUnit> {
        ClasspathScanner::find_classes(self, predicate)
    }

    fn find_resources(&self, pattern: &str) -> Result<ScanReport<ResourceLocator>> {
        ClasspathScanner::find_resources(self, pattern)
    }
}

impl ClassFinder for &'static ClasspathScanner {
    fn classpath_roots(&self) -> &[ClasspathRoot] {
        ClasspathScanner::classpath_roots(self)
    }

    fn find_classes(&self, predicate: &dyn Fn(&DiscoveryUnit) -> bool) -> ScanReport<DiscoveryUnit> {
        ClasspathScanner::find_classes(self, predicate)
    }

    fn find_resources(&self, pattern: &str) -> Result<ScanReport<ResourceLocator>> {
        ClasspathScanner::find_resources(self, pattern)
    }
}

fn parse_listing(listing: &OsString) -> Vec<ClasspathRoot> {
    let mut seen = HashSet::new();
    let mut roots = Vec::new();

    for path in std::env::split_paths(listing) {
        if path.as_os_str().is_empty() {
            continue;
        }
        let path = std::path::absolute(&path).unwrap_or(path);
        let root = ClasspathRoot::new(path);
        if seen.insert(root.clone()) {
            roots.push(root);
        }
    }

    debug!("resolved {} classpath root(s)", roots.len());
    roots
}

/// Compiles `pattern` so that it only matches whole strings.
pub(crate) fn full_match_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| ConfigurationError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })
}

fn root_entries(root: &ClasspathRoot) -> std::result::Result<Vec<RootEntry>, ScanError> {
    trace!("scanning classpath root [{}]", root.path().display());
    match root.kind() {
        RootKind::Directory => Ok(directory_entries(root.path())),
        RootKind::Archive => archive_entries(root.path()),
        RootKind::Other => {
            trace!("ignoring classpath root [{}]", root.path().display());
            Ok(Vec::new())
        }
    }
}

fn directory_entries(dir: &Path) -> Vec<RootEntry> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                trace!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let relative = entry.path().strip_prefix(dir).ok()?;
            let name = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some(RootEntry {
                name,
                file_name: entry.file_name().to_string_lossy().into_owned(),
                locator: ResourceLocator::File(entry.path().to_path_buf()),
            })
        })
        .collect()
}

fn archive_entries(path: &Path) -> std::result::Result<Vec<RootEntry>, ScanError> {
    let file = File::open(path).map_err(|source| ScanError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file).map_err(|source| ScanError::Archive {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(err) => {
                trace!("skipping archive entry #{index} in [{}]: {err}", path.display());
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        let file_name = name.rsplit('/').next().unwrap_or(&name).to_string();
        entries.push(RootEntry {
            locator: ResourceLocator::ArchiveEntry {
                archive: path.to_path_buf(),
                entry: name.clone(),
            },
            name,
            file_name,
        });
    }

    Ok(entries)
}
