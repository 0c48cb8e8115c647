// Watch Manager
//
// Keeps one watch per path and remembers which configurations asked for it.
// Refreshing a configuration opens what its newest parse needs and closes
// what only it needed before.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use ts::{parse_config_file, CompilerOptions, FileWatcher, FileWatcherEventKind, System, WatchDirectoryFlags};

use super::filter::WatchFilter;
use crate::logging::Logger;

/// Called with the changed path whenever a watch decides a rebuild is due.
pub type ChangeCallback = Rc<dyn Fn(&Path)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchTarget {
    File,
    Directory { recursive: bool },
}

impl WatchTarget {
    /// A mode that serves both requests.
    fn merge(self, other: WatchTarget) -> WatchTarget {
        match (self, other) {
            (WatchTarget::Directory { recursive: a }, WatchTarget::Directory { recursive: b }) => {
                WatchTarget::Directory { recursive: a || b }
            }
            (WatchTarget::Directory { .. }, WatchTarget::File) => self,
            (WatchTarget::File, _) => other,
        }
    }
}

type Owners = SmallVec<[(PathBuf, WatchTarget); 2]>;

fn merged_target(owners: &Owners) -> Option<WatchTarget> {
    owners.iter().map(|(_, target)| *target).reduce(WatchTarget::merge)
}

struct WatchEntry {
    watcher: Box<dyn FileWatcher>,
    target: WatchTarget,
    filter: Option<Rc<RefCell<WatchFilter>>>,
    /// Configurations using the watch and the mode each asked for.
    owners: Owners,
}

pub struct WatchManager {
    sys: Rc<dyn System>,
    default_options: CompilerOptions,
    on_change: ChangeCallback,
    logger: Rc<dyn Logger>,
    watches: IndexMap<PathBuf, WatchEntry>,
    stopped: bool,
}

impl WatchManager {
    pub fn new(
        sys: Rc<dyn System>,
        default_options: CompilerOptions,
        on_change: ChangeCallback,
        logger: Rc<dyn Logger>,
    ) -> Self {
        Self {
            sys,
            default_options,
            on_change,
            logger,
            watches: IndexMap::new(),
            stopped: false,
        }
    }

    /// Bring the watches of `config_path` in line with its current contents.
    ///
    /// The config file is always watched. When the file cannot be parsed the
    /// watches from the last good parse stay open. Returns whether the parse
    /// succeeded.
    pub fn watch_configuration(&mut self, config_path: &Path) -> bool {
        if self.stopped {
            self.logger
                .debug(&format!("ignoring watch refresh for {} after stop", config_path.display()));
            return false;
        }

        let parsed = match parse_config_file(config_path, Some(&self.default_options), self.sys.as_ref()) {
            Ok(parsed) => parsed,
            Err(diagnostic) => {
                self.logger.warn(&format!(
                    "cannot read {} for watching: {}",
                    config_path.display(),
                    diagnostic.message_text
                ));
                self.ensure(config_path, WatchTarget::File, config_path, None);
                return false;
            }
        };

        let mut wanted: IndexMap<PathBuf, WatchTarget> = IndexMap::new();
        wanted.insert(config_path.to_path_buf(), WatchTarget::File);
        for (directory, flags) in &parsed.wildcard_directories {
            let recursive = flags.contains(WatchDirectoryFlags::RECURSIVE);
            wanted.insert(directory.clone(), WatchTarget::Directory { recursive });
        }
        for file in &parsed.file_names {
            if !covered_by_directory(file, &wanted) {
                wanted.entry(file.clone()).or_insert(WatchTarget::File);
            }
        }

        let stale: Vec<PathBuf> = self
            .watches
            .iter()
            .filter(|(path, entry)| entry.owners.iter().any(|(o, _)| o == config_path) && !wanted.contains_key(*path))
            .map(|(path, _)| path.clone())
            .collect();
        for path in stale {
            self.release(&path, config_path);
        }

        for (path, target) in wanted {
            let filter = match target {
                WatchTarget::Directory { .. } => Some((parsed.options.clone(), parsed.file_names.clone())),
                WatchTarget::File => None,
            };
            self.ensure(&path, target, config_path, filter);
        }
        true
    }

    fn ensure(
        &mut self,
        path: &Path,
        target: WatchTarget,
        owner: &Path,
        filter: Option<(CompilerOptions, Vec<PathBuf>)>,
    ) {
        let Some(entry) = self.watches.get_mut(path) else {
            let mut owners = Owners::new();
            owners.push((owner.to_path_buf(), target));
            let filter = filter.map(|(options, inputs)| Rc::new(RefCell::new(WatchFilter::new(path, options, inputs))));
            self.open(path, target, owners, filter);
            return;
        };

        match entry.owners.iter_mut().find(|(o, _)| o == owner) {
            Some(slot) => slot.1 = target,
            None => entry.owners.push((owner.to_path_buf(), target)),
        }
        if let Some((options, inputs)) = filter {
            if let Some(current) = &entry.filter {
                current.borrow_mut().update(options, inputs);
            } else {
                entry.filter = Some(Rc::new(RefCell::new(WatchFilter::new(path, options, inputs))));
            }
        }
        if let Some(wanted) = merged_target(&entry.owners) {
            if wanted != entry.target {
                self.reopen(path, wanted);
            }
        }
    }

    /// Replace the watch on `path` with one in `target` mode, keeping its
    /// owners and filter.
    fn reopen(&mut self, path: &Path, target: WatchTarget) {
        let Some(entry) = self.watches.shift_remove(path) else {
            return;
        };
        self.logger
            .debug(&format!("reopening watch on {} as {:?}", path.display(), target));
        entry.watcher.close();
        self.open(path, target, entry.owners, entry.filter);
    }

    fn open(&mut self, path: &Path, target: WatchTarget, owners: Owners, filter: Option<Rc<RefCell<WatchFilter>>>) {
        let on_change = self.on_change.clone();
        let (watcher, filter) = match target {
            WatchTarget::File => {
                self.logger.debug(&format!("watching file {}", path.display()));
                let watcher = self.sys.watch_file(
                    path,
                    Rc::new(move |changed: &Path, _: FileWatcherEventKind| on_change(changed)),
                );
                (watcher, None)
            }
            WatchTarget::Directory { recursive } => {
                if !self.sys.directory_exists(path) {
                    self.logger
                        .warn(&format!("watching missing directory {}", path.display()));
                }
                self.logger.debug(&format!(
                    "watching directory {}{}",
                    path.display(),
                    if recursive { " (recursive)" } else { "" }
                ));
                let filter = filter.unwrap_or_else(|| {
                    Rc::new(RefCell::new(WatchFilter::new(path, CompilerOptions::default(), Vec::new())))
                });
                let decide = filter.clone();
                let watcher = self.sys.watch_directory(
                    path,
                    Rc::new(move |changed: &Path| {
                        if decide.borrow().should_rebuild(changed) {
                            on_change(changed)
                        }
                    }),
                    recursive,
                );
                (watcher, Some(filter))
            }
        };

        self.watches.insert(
            path.to_path_buf(),
            WatchEntry {
                watcher,
                target,
                filter,
                owners,
            },
        );
    }

    fn release(&mut self, path: &Path, owner: &Path) {
        let Some(entry) = self.watches.get_mut(path) else {
            return;
        };
        entry.owners.retain(|(o, _)| o != owner);
        match merged_target(&entry.owners) {
            None => {
                if let Some(entry) = self.watches.shift_remove(path) {
                    self.logger.debug(&format!("closing watch on {}", path.display()));
                    entry.watcher.close();
                }
            }
            Some(wanted) if wanted != entry.target => self.reopen(path, wanted),
            Some(_) => {}
        }
    }

    /// Close every watch. Later refreshes are ignored.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for (path, entry) in self.watches.drain(..) {
            self.logger.debug(&format!("closing watch on {}", path.display()));
            entry.watcher.close();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_watching(&self, path: &Path) -> bool {
        self.watches.contains_key(path)
    }

    /// Watched paths in registration order.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.watches.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}

impl Drop for WatchManager {
    fn drop(&mut self) {
        self.stop();
    }
}

fn covered_by_directory(file: &Path, wanted: &IndexMap<PathBuf, WatchTarget>) -> bool {
    wanted.iter().any(|(directory, target)| match target {
        WatchTarget::Directory { recursive: true } => file.starts_with(directory),
        WatchTarget::Directory { recursive: false } => file.parent() == Some(directory.as_path()),
        WatchTarget::File => false,
    })
}
