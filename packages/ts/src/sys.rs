// System
//
// File system and watch services. Watch notifications are collected in the
// background and handed to callbacks only from `dispatch_watch_events`, on the
// calling thread.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, SystemTime};

use indexmap::IndexMap;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::path::clean_path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileWatcherEventKind {
    Created,
    Changed,
    Deleted,
}

pub type FileWatcherCallback = Rc<dyn Fn(&Path, FileWatcherEventKind)>;
pub type DirectoryWatcherCallback = Rc<dyn Fn(&Path)>;

/// An open watch. Closing is idempotent.
pub trait FileWatcher {
    fn close(&self);
}

pub trait System {
    fn new_line(&self) -> &str;
    fn get_current_directory(&self) -> PathBuf;
    fn read_file(&self, path: &Path) -> Option<String>;
    fn write_file(&self, path: &Path, data: &str) -> io::Result<()>;
    fn file_exists(&self, path: &Path) -> bool;
    fn directory_exists(&self, path: &Path) -> bool;
    /// Every file below `path`, recursively, in a stable order.
    fn read_directory(&self, path: &Path) -> Vec<PathBuf>;
    fn get_modified_time(&self, path: &Path) -> Option<SystemTime>;
    fn watch_file(&self, path: &Path, callback: FileWatcherCallback) -> Box<dyn FileWatcher>;
    fn watch_directory(
        &self,
        path: &Path,
        callback: DirectoryWatcherCallback,
        recursive: bool,
    ) -> Box<dyn FileWatcher>;
    /// Deliver pending watch notifications, waiting up to `timeout` for the
    /// first one. Returns how many callbacks ran.
    fn dispatch_watch_events(&self, timeout: Duration) -> usize;
}

// ============================================================================
// Watch registrations
// ============================================================================

/// Registered watch callbacks keyed by id, shared by a system and its handles.
pub(crate) enum WatchCallback {
    File(FileWatcherCallback),
    Directory {
        callback: DirectoryWatcherCallback,
        recursive: bool,
    },
}

pub(crate) struct Registration<W> {
    pub path: PathBuf,
    pub callback: WatchCallback,
    /// Backend resource kept alive for the lifetime of the watch.
    pub _backend: Option<W>,
}

pub(crate) type Registrations<W> = Rc<RefCell<IndexMap<u64, Registration<W>>>>;

/// Callbacks interested in a change to `changed`, cloned out of the table so
/// that they may register or close watches while running.
pub(crate) fn matching_callbacks<W>(
    registrations: &Registrations<W>,
    changed: &Path,
    kind: FileWatcherEventKind,
) -> Vec<Box<dyn Fn()>> {
    let table = registrations.borrow();
    let mut out: Vec<Box<dyn Fn()>> = Vec::new();
    for registration in table.values() {
        let path = changed.to_path_buf();
        match &registration.callback {
            WatchCallback::File(callback) if registration.path == changed => {
                let callback = callback.clone();
                out.push(Box::new(move || callback(&path, kind)));
            }
            WatchCallback::Directory { callback, recursive } => {
                let inside = changed == registration.path
                    || if *recursive {
                        changed.starts_with(&registration.path)
                    } else {
                        changed.parent() == Some(registration.path.as_path())
                    };
                if inside {
                    let callback = callback.clone();
                    out.push(Box::new(move || callback(&path)));
                }
            }
            _ => {}
        }
    }
    out
}

pub(crate) struct RegisteredWatcher<W> {
    pub id: u64,
    pub registrations: Registrations<W>,
    pub on_close: Option<Rc<dyn Fn(&Path)>>,
}

impl<W> FileWatcher for RegisteredWatcher<W> {
    fn close(&self) {
        let removed = self.registrations.borrow_mut().shift_remove(&self.id);
        if let (Some(registration), Some(on_close)) = (removed, &self.on_close) {
            on_close(&registration.path);
        }
    }
}

// ============================================================================
// RealSystem
// ============================================================================

type NotifyMessage = (u64, notify::Result<notify::Event>);

/// The host operating system, with `notify` watchers.
pub struct RealSystem {
    registrations: Registrations<RecommendedWatcher>,
    next_id: RefCell<u64>,
    sender: Sender<NotifyMessage>,
    receiver: Receiver<NotifyMessage>,
}

impl Default for RealSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl RealSystem {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            registrations: Rc::new(RefCell::new(IndexMap::new())),
            next_id: RefCell::new(0),
            sender,
            receiver,
        }
    }

    fn register(
        &self,
        path: &Path,
        callback: WatchCallback,
        mode: RecursiveMode,
    ) -> Box<dyn FileWatcher> {
        let id = {
            let mut next = self.next_id.borrow_mut();
            *next += 1;
            *next
        };
        let sender = self.sender.clone();
        let backend = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let _ = sender.send((id, event));
        })
        .and_then(|mut watcher| watcher.watch(path, mode).map(|()| watcher))
        .ok();

        self.registrations.borrow_mut().insert(
            id,
            Registration {
                path: path.to_path_buf(),
                callback,
                _backend: backend,
            },
        );
        Box::new(RegisteredWatcher {
            id,
            registrations: self.registrations.clone(),
            on_close: None,
        })
    }

    fn deliver(&self, message: NotifyMessage) -> usize {
        let (_, event) = message;
        let Ok(event) = event else {
            return 0;
        };
        let kind = match event.kind {
            EventKind::Create(_) => FileWatcherEventKind::Created,
            EventKind::Remove(_) => FileWatcherEventKind::Deleted,
            EventKind::Modify(_) | EventKind::Any => FileWatcherEventKind::Changed,
            EventKind::Access(_) | EventKind::Other => return 0,
        };
        let mut delivered = 0;
        for path in &event.paths {
            for callback in matching_callbacks(&self.registrations, path, kind) {
                callback();
                delivered += 1;
            }
        }
        delivered
    }
}

impl System for RealSystem {
    fn new_line(&self) -> &str {
        if cfg!(windows) {
            "\r\n"
        } else {
            "\n"
        }
    }

    fn get_current_directory(&self) -> PathBuf {
        std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        fs::read_to_string(path).ok()
    }

    fn write_file(&self, path: &Path, data: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn directory_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_directory(&self, path: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut pending = vec![path.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            let mut entries: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
            entries.sort();
            for entry in entries.into_iter().rev() {
                if entry.is_dir() {
                    pending.push(entry);
                } else {
                    files.push(clean_path(&entry));
                }
            }
        }
        files.sort();
        files
    }

    fn get_modified_time(&self, path: &Path) -> Option<SystemTime> {
        fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    fn watch_file(&self, path: &Path, callback: FileWatcherCallback) -> Box<dyn FileWatcher> {
        self.register(path, WatchCallback::File(callback), RecursiveMode::NonRecursive)
    }

    fn watch_directory(
        &self,
        path: &Path,
        callback: DirectoryWatcherCallback,
        recursive: bool,
    ) -> Box<dyn FileWatcher> {
        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        self.register(path, WatchCallback::Directory { callback, recursive }, mode)
    }

    fn dispatch_watch_events(&self, timeout: Duration) -> usize {
        let first = match self.receiver.recv_timeout(timeout) {
            Ok(message) => message,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => return 0,
        };
        let mut delivered = self.deliver(first);
        while let Ok(message) = self.receiver.try_recv() {
            delivered += self.deliver(message);
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn should_list_files_recursively_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let sys = RealSystem::new();
        sys.write_file(&dir.path().join("src/b.ts"), "").unwrap();
        sys.write_file(&dir.path().join("src/a/c.ts"), "").unwrap();
        sys.write_file(&dir.path().join("tsconfig.json"), "{}").unwrap();

        let root = clean_path(dir.path());
        let files = sys.read_directory(&root);
        assert_eq!(
            files,
            vec![root.join("src/a/c.ts"), root.join("src/b.ts"), root.join("tsconfig.json")]
        );
        assert!(sys.file_exists(&root.join("src/b.ts")));
        assert!(sys.directory_exists(&root.join("src/a")));
    }

    #[test]
    fn should_match_directory_callbacks_by_recursion() {
        let registrations: Registrations<()> = Rc::new(RefCell::new(IndexMap::new()));
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        registrations.borrow_mut().insert(
            1,
            Registration {
                path: PathBuf::from("/p/src"),
                callback: WatchCallback::Directory {
                    callback: Rc::new(move |_: &Path| counter.set(counter.get() + 1)),
                    recursive: false,
                },
                _backend: None,
            },
        );

        let changed = |path: &str| matching_callbacks(&registrations, Path::new(path), FileWatcherEventKind::Changed);
        for callback in changed("/p/src/a.ts") {
            callback();
        }
        assert_eq!(hits.get(), 1);
        assert!(changed("/p/src/deep/a.ts").is_empty());
        assert_eq!(changed("/p/src").len(), 1);
    }

    #[test]
    fn should_remove_registrations_on_close() {
        let registrations: Registrations<()> = Rc::new(RefCell::new(IndexMap::new()));
        registrations.borrow_mut().insert(
            7,
            Registration {
                path: PathBuf::from("/p/a.ts"),
                callback: WatchCallback::File(Rc::new(|_: &Path, _: FileWatcherEventKind| {})),
                _backend: None,
            },
        );
        let watcher = RegisteredWatcher {
            id: 7,
            registrations: registrations.clone(),
            on_close: None,
        };
        watcher.close();
        watcher.close();
        assert!(registrations.borrow().is_empty());
    }
}
