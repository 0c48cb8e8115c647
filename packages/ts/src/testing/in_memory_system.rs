// In-Memory System
//
// Deterministic `System` for tests. Modification times come from a logical
// clock that ticks once per write, and watch notifications queue up until
// `dispatch_watch_events` is called.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

use crate::path::{clean_path, resolve};
use crate::sys::{
    matching_callbacks, DirectoryWatcherCallback, FileWatcher, FileWatcherCallback,
    FileWatcherEventKind, RegisteredWatcher, Registration, Registrations, System, WatchCallback,
};

pub struct InMemorySystem {
    cwd: PathBuf,
    new_line: String,
    files: RefCell<BTreeMap<PathBuf, (String, SystemTime)>>,
    clock: Cell<u64>,
    pending: RefCell<VecDeque<(PathBuf, FileWatcherEventKind)>>,
    registrations: Registrations<()>,
    next_id: Cell<u64>,
    opened: Cell<usize>,
    closed: Rc<Cell<usize>>,
    unwritable: RefCell<Vec<PathBuf>>,
}

impl InMemorySystem {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: clean_path(cwd.as_ref()),
            new_line: "\n".to_string(),
            files: RefCell::new(BTreeMap::new()),
            clock: Cell::new(1),
            pending: RefCell::new(VecDeque::new()),
            registrations: Rc::new(RefCell::new(IndexMap::new())),
            next_id: Cell::new(0),
            opened: Cell::new(0),
            closed: Rc::new(Cell::new(0)),
            unwritable: RefCell::new(Vec::new()),
        }
    }

    pub fn with_new_line(mut self, new_line: impl Into<String>) -> Self {
        self.new_line = new_line.into();
        self
    }

    fn absolute(&self, path: impl AsRef<Path>) -> PathBuf {
        resolve(&self.cwd, path)
    }

    fn tick(&self) -> SystemTime {
        let now = self.clock.get() + 1;
        self.clock.set(now);
        UNIX_EPOCH + Duration::from_secs(now)
    }

    /// Create or overwrite a file, queueing a watch notification.
    pub fn write(&self, path: impl AsRef<Path>, text: &str) {
        let path = self.absolute(path);
        let time = self.tick();
        let previous = self.files.borrow_mut().insert(path.clone(), (text.to_string(), time));
        let kind = if previous.is_some() {
            FileWatcherEventKind::Changed
        } else {
            FileWatcherEventKind::Created
        };
        self.pending.borrow_mut().push_back((path, kind));
    }

    /// Delete a file, queueing a watch notification when it existed.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = self.absolute(path);
        if self.files.borrow_mut().remove(&path).is_some() {
            self.tick();
            self.pending
                .borrow_mut()
                .push_back((path, FileWatcherEventKind::Deleted));
        }
    }

    pub fn read(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files
            .borrow()
            .get(&self.absolute(path))
            .map(|(text, _)| text.clone())
    }

    /// Make `write_file` fail for `path`.
    pub fn deny_writes(&self, path: impl AsRef<Path>) {
        let path = self.absolute(path);
        self.unwritable.borrow_mut().push(path);
    }

    /// Paths with an open watch, in registration order.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.registrations
            .borrow()
            .values()
            .map(|r| r.path.clone())
            .collect()
    }

    pub fn is_watching(&self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute(path);
        self.registrations.borrow().values().any(|r| r.path == path)
    }

    pub fn open_watch_count(&self) -> usize {
        self.registrations.borrow().len()
    }

    /// Watches opened since creation.
    pub fn watches_opened(&self) -> usize {
        self.opened.get()
    }

    /// Watches closed since creation.
    pub fn watches_closed(&self) -> usize {
        self.closed.get()
    }

    pub fn pending_event_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Drop queued notifications without delivering them.
    pub fn discard_pending_events(&self) {
        self.pending.borrow_mut().clear();
    }

    fn register(&self, path: &Path, callback: WatchCallback) -> Box<dyn FileWatcher> {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        self.opened.set(self.opened.get() + 1);
        self.registrations.borrow_mut().insert(
            id,
            Registration {
                path: self.absolute(path),
                callback,
                _backend: None,
            },
        );
        let closed = self.closed.clone();
        Box::new(RegisteredWatcher {
            id,
            registrations: self.registrations.clone(),
            on_close: Some(Rc::new(move |_: &Path| closed.set(closed.get() + 1))),
        })
    }
}

impl System for InMemorySystem {
    fn new_line(&self) -> &str {
        &self.new_line
    }

    fn get_current_directory(&self) -> PathBuf {
        self.cwd.clone()
    }

    fn read_file(&self, path: &Path) -> Option<String> {
        self.read(path)
    }

    fn write_file(&self, path: &Path, data: &str) -> io::Result<()> {
        let path = self.absolute(path);
        if self.unwritable.borrow().contains(&path) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "write denied",
            ));
        }
        self.write(path, data);
        Ok(())
    }

    fn file_exists(&self, path: &Path) -> bool {
        self.files.borrow().contains_key(&self.absolute(path))
    }

    fn directory_exists(&self, path: &Path) -> bool {
        let dir = self.absolute(path);
        self.files
            .borrow()
            .keys()
            .any(|file| file != &dir && file.starts_with(&dir))
    }

    fn read_directory(&self, path: &Path) -> Vec<PathBuf> {
        let dir = self.absolute(path);
        self.files
            .borrow()
            .keys()
            .filter(|file| *file != &dir && file.starts_with(&dir))
            .cloned()
            .collect()
    }

    fn get_modified_time(&self, path: &Path) -> Option<SystemTime> {
        self.files
            .borrow()
            .get(&self.absolute(path))
            .map(|(_, time)| *time)
    }

    fn watch_file(&self, path: &Path, callback: FileWatcherCallback) -> Box<dyn FileWatcher> {
        self.register(path, WatchCallback::File(callback))
    }

    fn watch_directory(
        &self,
        path: &Path,
        callback: DirectoryWatcherCallback,
        recursive: bool,
    ) -> Box<dyn FileWatcher> {
        self.register(path, WatchCallback::Directory { callback, recursive })
    }

    /// Delivers the notifications queued so far; ones queued by the callbacks
    /// themselves wait for the next call.
    fn dispatch_watch_events(&self, _timeout: Duration) -> usize {
        let batch: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        let mut delivered = 0;
        for (path, kind) in batch {
            for callback in matching_callbacks(&self.registrations, &path, kind) {
                callback();
                delivered += 1;
            }
        }
        delivered
    }
}
